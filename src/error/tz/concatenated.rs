use crate::error;

/// The size, in bytes, of one entry in the index block.
pub(crate) const INDEX_ENTRY_LEN: usize = 52;

#[derive(Clone, Debug)]
pub(crate) enum Error {
    DuplicateIanaName { name: Box<str> },
    EmptyIndex,
    ExpectedFirstSixBytes,
    ExpectedIanaName,
    ExpectedLastByte,
    ExpectedVersion,
    FailedReadData,
    FailedReadHeader,
    FailedReadIndex,
    InvalidFinalOffset,
    InvalidIndexDataOffsets,
    InvalidLengthIndexBlock,
    InvalidZoneRange { name: Box<str> },
    UnsortedIndex { name: Box<str> },
}

impl From<Error> for error::Error {
    #[cold]
    #[inline(never)]
    fn from(err: Error) -> error::Error {
        error::ErrorKind::TzConcatenated(err).into()
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
            DuplicateIanaName { ref name } => write!(
                f,
                "found duplicate time zone identifier `{name}` \
                 in tzdata index",
            ),
            EmptyIndex => f.write_str(
                "found no time zone identifiers in tzdata index block",
            ),
            ExpectedFirstSixBytes => f.write_str(
                "expected first 6 bytes of tzdata header to be `tzdata`",
            ),
            ExpectedIanaName => f.write_str(
                "expected time zone identifier in tzdata index \
                 to be non-empty printable ASCII",
            ),
            ExpectedLastByte => {
                f.write_str("expected last byte of tzdata header to be `NUL`")
            }
            ExpectedVersion => f.write_str(
                "expected version in tzdata header to be \
                 printable ASCII",
            ),
            FailedReadData => f.write_str("failed to read zone data block"),
            FailedReadHeader => f.write_str("failed to read tzdata header"),
            FailedReadIndex => f.write_str("failed to read index block"),
            InvalidFinalOffset => f.write_str(
                "invalid final offset, expected it to be at least \
                 the data offset",
            ),
            InvalidIndexDataOffsets => f.write_str(
                "invalid index and data offsets, \
                 expected index offset to be less than or equal \
                 to data offset",
            ),
            InvalidLengthIndexBlock => write!(
                f,
                "length of index block is not a multiple \
                 of {INDEX_ENTRY_LEN}",
            ),
            InvalidZoneRange { ref name } => write!(
                f,
                "byte range for time zone `{name}` is outside \
                 the zone data block",
            ),
            UnsortedIndex { ref name } => write!(
                f,
                "time zone identifier `{name}` is out of order \
                 in tzdata index",
            ),
        }
    }
}
