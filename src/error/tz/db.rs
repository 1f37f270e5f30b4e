use crate::error;

#[derive(Clone, Debug)]
pub(crate) enum Error {
    FailedTimeZone { name: Box<str> },
    NoValidSource,
}

impl Error {
    pub(crate) fn failed_time_zone(time_zone_name: &str) -> Error {
        Error::FailedTimeZone { name: time_zone_name.into() }
    }
}

impl From<Error> for error::Error {
    #[cold]
    #[inline(never)]
    fn from(err: Error) -> error::Error {
        error::ErrorKind::TzDb(err).into()
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
            FailedTimeZone { ref name } => write!(
                f,
                "failed to decode time zone `{name}` \
                 from time zone catalog",
            ),
            NoValidSource => f.write_str(
                "no tzdata source was given, so there is \
                 nothing to load a time zone catalog from",
            ),
        }
    }
}
