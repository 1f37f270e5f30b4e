use crate::error;

#[derive(Clone, Debug)]
pub(crate) enum Error {
    NoSource,
}

impl From<Error> for error::Error {
    #[cold]
    #[inline(never)]
    fn from(err: Error) -> error::Error {
        error::ErrorKind::TzFinder(err).into()
    }
}

impl error::IntoError for Error {
    fn into_error(self) -> error::Error {
        self.into()
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::Error::*;

        match *self {
            NoSource => f.write_str(
                "no country configuration source was given, so there \
                 is nothing to build a time zone finder from",
            ),
        }
    }
}
