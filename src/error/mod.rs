use std::sync::Arc;

use crate::tz::{FormatError, FormatErrorKind, ParseError, ParseErrorKind};

pub(crate) mod tz;

/// An error that can occur in this crate.
///
/// Errors come from a few different places:
///
/// * Decoding the binary transition data for a single time zone. The
/// underlying [`FormatError`] can be recovered with [`Error::format_kind`].
/// * Decoding a multi-zone container.
/// * Parsing the country configuration. The underlying [`ParseError`] can
/// be recovered with [`Error::parse_kind`].
/// * An I/O error as a result of reading time zone data or country
/// configuration from the file system.
///
/// # Design
///
/// Operations that can fail for a variety of reasons return this one error
/// type. Each error carries an optional cause, and the `Display`
/// implementation renders the whole chain from the highest level context to
/// the root cause, separated by `: `. For example, a zone that fails to
/// decode while validating a catalog reports both the zone identifier and
/// what was wrong with its data.
///
/// Errors are cheap to clone.
#[derive(Clone)]
pub struct Error {
    /// The internal representation of an error.
    ///
    /// This is in an `Arc` to make an `Error` cloneable even though it may
    /// embed a `std::io::Error`. It also keeps the size of an error to one
    /// word.
    inner: Option<Arc<ErrorInner>>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    cause: Option<Error>,
}

impl Error {
    /// Creates a new error value from `core::fmt::Arguments`.
    ///
    /// Callers should generally use their own error types. But in some
    /// circumstances, for example when implementing a byte source that
    /// feeds this crate, it can be convenient to manufacture an error value
    /// of this type specifically.
    ///
    /// # Example
    ///
    /// ```
    /// use tzrules::Error;
    ///
    /// let err = Error::from_args(format_args!("something failed"));
    /// assert_eq!(err.to_string(), "something failed");
    /// ```
    pub fn from_args<'a>(message: core::fmt::Arguments<'a>) -> Error {
        Error::from(ErrorKind::Adhoc(AdhocError::from_args(message)))
    }

    /// Returns the kind of zone data format error at the root of this
    /// error, if there is one.
    ///
    /// # Example
    ///
    /// ```
    /// use tzrules::{tz::{FormatErrorKind, TransitionTable}, Error};
    ///
    /// let err = TransitionTable::decode("Nowhere", b"TZif").unwrap_err();
    /// let err = Error::from(err);
    /// assert_eq!(err.format_kind(), Some(FormatErrorKind::Truncated));
    /// ```
    pub fn format_kind(&self) -> Option<FormatErrorKind> {
        match *self.root().kind() {
            ErrorKind::Format(ref err) => Some(err.kind()),
            _ => None,
        }
    }

    /// Returns the kind of country configuration error at the root of this
    /// error, if there is one.
    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        match *self.root().kind() {
            ErrorKind::Parse(ref err) => Some(err.kind()),
            _ => None,
        }
    }

    /// Returns true when this error originated from an I/O failure, such as
    /// a missing or unreadable file.
    pub fn is_io(&self) -> bool {
        matches!(*self.root().kind(), ErrorKind::IO(_))
    }
}

impl Error {
    /// Creates a new error indicating that a `given` value is out of the
    /// specified `min..=max` range. The given `what` label is used in the
    /// error message as a human readable description of what exactly is out
    /// of range. (e.g., "month")
    #[inline(never)]
    #[cold]
    pub(crate) fn range(
        what: &'static str,
        given: impl Into<i64>,
        min: impl Into<i64>,
        max: impl Into<i64>,
    ) -> Error {
        Error::from(ErrorKind::Range(RangeError::new(what, given, min, max)))
    }

    /// A convenience constructor for building an I/O error.
    ///
    /// This returns an error that is just a simple wrapper around the
    /// `std::io::Error` type. In general, callers should always attach some
    /// kind of context to this error (like a file path).
    #[inline(never)]
    #[cold]
    pub(crate) fn io(err: std::io::Error) -> Error {
        Error::from(ErrorKind::IO(IOError { err }))
    }

    /// Contextualizes this error by associating the given file path with it.
    ///
    /// This is a convenience routine for calling `Error::context` with a
    /// `FilePathError`.
    #[inline(never)]
    #[cold]
    pub(crate) fn path(self, path: impl Into<std::path::PathBuf>) -> Error {
        let err = Error::from(ErrorKind::FilePath(FilePathError {
            path: path.into(),
        }));
        self.context(err)
    }

    /// Creates an error for a failed file system operation on `path`.
    #[inline(never)]
    #[cold]
    pub(crate) fn fs(
        path: impl Into<std::path::PathBuf>,
        err: std::io::Error,
    ) -> Error {
        Error::io(err).path(path)
    }

    pub(crate) fn context(self, consequent: impl IntoError) -> Error {
        self.context_impl(consequent.into_error())
    }

    #[inline(never)]
    #[cold]
    fn context_impl(self, consequent: Error) -> Error {
        let mut err = consequent;
        if err.inner.is_none() {
            err = Error::from(ErrorKind::Unknown);
        }
        // A freshly built consequent has one reference and no cause.
        let fresh = err
            .inner
            .as_mut()
            .and_then(Arc::get_mut)
            .filter(|inner| inner.cause.is_none());
        if let Some(inner) = fresh {
            inner.cause = Some(self);
            return err;
        }
        // Otherwise the consequent is shared or already has a cause, so
        // flatten it into a message rather than mutating or dropping it.
        let kind =
            ErrorKind::Adhoc(AdhocError::from_args(format_args!("{err}")));
        Error { inner: Some(Arc::new(ErrorInner { kind, cause: Some(self) })) }
    }

    /// Returns the root error in this chain.
    fn root(&self) -> &Error {
        let mut err = self;
        while let Some(cause) =
            err.inner.as_ref().and_then(|inner| inner.cause.as_ref())
        {
            err = cause;
        }
        err
    }

    /// Returns a chain of error values.
    ///
    /// This starts with the most recent error added to the chain. That is,
    /// the highest level context. The last error in the chain is always the
    /// "root" cause. That is, the error closest to the point where something
    /// has gone wrong.
    ///
    /// The iterator returned is guaranteed to yield at least one error.
    fn chain(&self) -> impl Iterator<Item = &Error> {
        let mut err = self;
        core::iter::once(err).chain(core::iter::from_fn(move || {
            err = err.inner.as_ref().and_then(|inner| inner.cause.as_ref())?;
            Some(err)
        }))
    }

    /// Returns the kind of this error.
    fn kind(&self) -> &ErrorKind {
        self.inner
            .as_ref()
            .map(|inner| &inner.kind)
            .unwrap_or(&ErrorKind::Unknown)
    }
}

impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut it = self.chain().peekable();
        while let Some(err) = it.next() {
            core::fmt::Display::fmt(err.kind(), f)?;
            if it.peek().is_some() {
                f.write_str(": ")?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            let Some(ref inner) = self.inner else {
                return f
                    .debug_struct("Error")
                    .field("kind", &"None")
                    .finish();
            };
            f.debug_struct("Error")
                .field("kind", &inner.kind)
                .field("cause", &inner.cause)
                .finish()
        }
    }
}

/// The underlying kind of a [`Error`].
#[derive(Debug)]
enum ErrorKind {
    Adhoc(AdhocError),
    FilePath(FilePathError),
    Format(FormatError),
    IO(IOError),
    Parse(ParseError),
    Range(RangeError),
    TzConcatenated(self::tz::concatenated::Error),
    TzDb(self::tz::db::Error),
    TzFinder(self::tz::finder::Error),
    Unknown,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::ErrorKind::*;

        match *self {
            Adhoc(ref msg) => core::fmt::Display::fmt(msg, f),
            FilePath(ref err) => core::fmt::Display::fmt(err, f),
            Format(ref err) => core::fmt::Display::fmt(err, f),
            IO(ref err) => core::fmt::Display::fmt(err, f),
            Parse(ref err) => core::fmt::Display::fmt(err, f),
            Range(ref err) => core::fmt::Display::fmt(err, f),
            TzConcatenated(ref err) => core::fmt::Display::fmt(err, f),
            TzDb(ref err) => core::fmt::Display::fmt(err, f),
            TzFinder(ref err) => core::fmt::Display::fmt(err, f),
            Unknown => f.write_str("unknown tzrules error"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error { inner: Some(Arc::new(ErrorInner { kind, cause: None })) }
    }
}

impl From<FormatError> for Error {
    #[cold]
    #[inline(never)]
    fn from(err: FormatError) -> Error {
        ErrorKind::Format(err).into()
    }
}

impl From<ParseError> for Error {
    #[cold]
    #[inline(never)]
    fn from(err: ParseError) -> Error {
        ErrorKind::Parse(err).into()
    }
}

impl IntoError for FormatError {
    fn into_error(self) -> Error {
        self.into()
    }
}

impl IntoError for ParseError {
    fn into_error(self) -> Error {
        self.into()
    }
}

/// A generic error message.
///
/// This supports the `Error::from_args` public API, which permits callers
/// to manifest their own `Error` values from an arbitrary message.
struct AdhocError {
    message: Box<str>,
}

impl AdhocError {
    fn from_args<'a>(message: core::fmt::Arguments<'a>) -> AdhocError {
        let message = message.to_string().into_boxed_str();
        AdhocError { message }
    }
}

impl std::error::Error for AdhocError {}

impl core::fmt::Display for AdhocError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.message, f)
    }
}

impl core::fmt::Debug for AdhocError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        core::fmt::Debug::fmt(&self.message, f)
    }
}

/// An error that occurs when an input value is out of bounds.
///
/// The error message produced by this type will include a name describing
/// which input was out of bounds, the value given and its minimum and maximum
/// allowed values.
#[derive(Debug)]
struct RangeError {
    what: &'static str,
    given: i64,
    min: i64,
    max: i64,
}

impl RangeError {
    fn new(
        what: &'static str,
        given: impl Into<i64>,
        min: impl Into<i64>,
        max: impl Into<i64>,
    ) -> RangeError {
        RangeError {
            what,
            given: given.into(),
            min: min.into(),
            max: max.into(),
        }
    }
}

impl std::error::Error for RangeError {}

impl core::fmt::Display for RangeError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let RangeError { what, given, min, max } = *self;
        write!(
            f,
            "parameter '{what}' with value {given} \
             is not in the required range of {min}..={max}",
        )
    }
}

/// A `std::io::Error`.
///
/// A simple wrapper around `std::io::Error`. Since the I/O error isn't
/// cloneable, this is only ever stored behind the `Arc` in `Error`.
struct IOError {
    err: std::io::Error,
}

impl std::error::Error for IOError {}

impl core::fmt::Display for IOError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl core::fmt::Debug for IOError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("IOError").field("err", &self.err).finish()
    }
}

struct FilePathError {
    path: std::path::PathBuf,
}

impl std::error::Error for FilePathError {}

impl core::fmt::Display for FilePathError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl core::fmt::Debug for FilePathError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("FilePathError").field("path", &self.path).finish()
    }
}

/// A simple trait to encapsulate automatic conversion to `Error`.
///
/// This trait basically exists to make `Error::context` work without needing
/// to rely on public `From` impls for every internal error type.
pub(crate) trait IntoError {
    fn into_error(self) -> Error;
}

impl IntoError for Error {
    #[inline(always)]
    fn into_error(self) -> Error {
        self
    }
}

/// A trait for contextualizing error values.
///
/// This makes it easy to contextualize either `Error` or `Result<T, Error>`.
/// Specifically, in the latter case, it absolves one of the need to call
/// `map_err` everywhere one wants to add context to an error.
///
/// This trick was borrowed from `anyhow`.
pub(crate) trait ErrorContext<T, E> {
    /// Contextualize the given consequent error with this (`self`) error as
    /// the cause.
    ///
    /// This is equivalent to saying that "consequent is caused by self."
    fn context(self, consequent: impl IntoError) -> Result<T, Error>;
}

impl<T, E> ErrorContext<T, E> for Result<T, E>
where
    E: IntoError,
{
    fn context(self, consequent: impl IntoError) -> Result<T, Error> {
        self.map_err(|err| {
            err.into_error().context_impl(consequent.into_error())
        })
    }
}
