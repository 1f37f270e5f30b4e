pub(crate) mod concatenated;
pub(crate) mod db;
pub(crate) mod finder;
