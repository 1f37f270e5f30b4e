/*!
Parsing and validation of the per-country time zone configuration.

The configuration is an XML document that, for each country, lists the
time zones in use there in order of preference along with a default:

```xml
<timezones ianaversion="2017b">
  <countryzones>
    <country code="gb" default="Europe/London" everutc="y">
      <id>Europe/London</id>
    </country>
  </countryzones>
</timezones>
```

Parsing is forward compatible: comments, unknown elements (along with
everything inside them) and unknown attributes are ignored. In
[`ParseMode::Strict`], a country must name a default that is also one of
its zones. [`ParseMode::Lenient`] trusts that the data was checked when it
was produced and skips those checks.

After parsing, an index is usually validated against a
[`ZoneCatalog`](crate::tz::ZoneCatalog). Validation drops zones the catalog
doesn't know about, since the configuration and the catalog may be updated
independently.
*/

use quick_xml::{
    escape::resolve_xml_entity,
    events::{BytesRef, BytesStart, Event},
    Reader,
};

use crate::tz::db::ZoneCatalog;

/// Controls how strictly a configuration is checked.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ParseMode {
    /// Every country must have a default, the default must be one of the
    /// country's zones and a country may only appear once.
    Strict,
    /// Countries may omit a default and the default is not checked against
    /// the country's zones. Later duplicates of a country are ignored.
    Lenient,
}

/// The zones of every configured country.
///
/// # Example
///
/// ```
/// use tzrules::tz::{CountryZoneIndex, ParseMode};
///
/// let index = CountryZoneIndex::parse(r#"
///     <timezones ianaversion="2024a">
///       <countryzones>
///         <country code="US" default="America/New_York">
///           <id>America/New_York</id>
///           <id>America/Chicago</id>
///         </country>
///       </countryzones>
///     </timezones>
/// "#, ParseMode::Strict)?;
/// assert_eq!(index.iana_version(), Some("2024a"));
/// assert_eq!(index.lookup_default("us"), Some("America/New_York"));
/// assert_eq!(
///     index.lookup_candidates("US"),
///     Some(vec!["America/New_York", "America/Chicago"]),
/// );
/// assert_eq!(index.lookup_candidates("gb"), None);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CountryZoneIndex {
    iana_version: Option<Box<str>>,
    /// Sorted by country code.
    countries: Vec<CountryZones>,
}

impl CountryZoneIndex {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// This returns an error when the document is not well formed XML, is
    /// missing its `timezones` root or `countryzones` element, or a country
    /// violates the rules of the given mode.
    pub fn parse(
        text: &str,
        mode: ParseMode,
    ) -> Result<CountryZoneIndex, ParseError> {
        let mut parser = Parser::new(text);
        let index = parser.document(mode)?;
        debug!(
            "parsed country configuration with {} countries, \
             IANA version {:?}",
            index.countries.len(),
            index.iana_version,
        );
        Ok(index)
    }

    /// Parses a configuration document and validates it against the given
    /// catalog.
    pub fn load(
        text: &str,
        mode: ParseMode,
        catalog: &ZoneCatalog,
    ) -> Result<CountryZoneIndex, ParseError> {
        CountryZoneIndex::parse(text, mode)?.validated(catalog, mode)
    }

    /// Returns an index with no countries.
    pub(crate) fn empty() -> CountryZoneIndex {
        CountryZoneIndex { iana_version: None, countries: vec![] }
    }

    /// Validates every country against the given catalog.
    ///
    /// See [`CountryZones::create_validated`] for what that entails.
    pub fn validated(
        self,
        catalog: &ZoneCatalog,
        mode: ParseMode,
    ) -> Result<CountryZoneIndex, ParseError> {
        let mut countries = Vec::with_capacity(self.countries.len());
        for country in self.countries {
            countries.push(CountryZones::create_validated(
                &country.code,
                country.default_zone_id.as_deref(),
                country.mappings,
                country.ever_uses_utc,
                catalog,
                mode,
            )?);
        }
        Ok(CountryZoneIndex { iana_version: self.iana_version, countries })
    }

    /// Returns the IANA rules version the configuration was produced for,
    /// if it says.
    pub fn iana_version(&self) -> Option<&str> {
        self.iana_version.as_deref()
    }

    /// Returns the zones of the given country. Country codes are compared
    /// case insensitively.
    pub fn country(&self, code: &str) -> Option<&CountryZones> {
        let code = code.to_ascii_lowercase();
        let i = self
            .countries
            .binary_search_by(|country| (*country.code).cmp(&code))
            .ok()?;
        Some(&self.countries[i])
    }

    /// Returns every configured country code, in lowercase and sorted.
    pub fn country_codes(&self) -> impl Iterator<Item = &str> + '_ {
        self.countries.iter().map(|country| &*country.code)
    }

    /// Returns the candidate zones of the given country in order of
    /// preference.
    ///
    /// This returns `None` for an unknown country, but an empty list for a
    /// country all of whose zones were dropped during validation.
    pub fn lookup_candidates(&self, code: &str) -> Option<Vec<&str>> {
        Some(self.country(code)?.zone_ids().collect())
    }

    /// Returns the default zone of the given country, if it has one.
    pub fn lookup_default(&self, code: &str) -> Option<&str> {
        self.country(code)?.default_zone_id()
    }
}

/// The zones configured for one country.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CountryZones {
    code: Box<str>,
    default_zone_id: Option<Box<str>>,
    ever_uses_utc: bool,
    mappings: Vec<TimeZoneMapping>,
}

impl CountryZones {
    /// Builds the zones of one country, validated against a catalog.
    ///
    /// Mappings whose zone isn't in the catalog are dropped. A default
    /// that isn't in the catalog is treated as absent. Both are logged as
    /// warnings, not reported as errors.
    ///
    /// # Errors
    ///
    /// In [`ParseMode::Strict`], a default that is not one of the retained
    /// mappings is an error.
    pub fn create_validated(
        code: &str,
        default_zone_id: Option<&str>,
        mappings: Vec<TimeZoneMapping>,
        ever_uses_utc: bool,
        catalog: &ZoneCatalog,
        mode: ParseMode,
    ) -> Result<CountryZones, ParseError> {
        let code: Box<str> = code.to_ascii_lowercase().into();
        let mappings: Vec<TimeZoneMapping> = mappings
            .into_iter()
            .filter(|mapping| {
                let known = catalog.has_zone(&mapping.id);
                if !known {
                    warn!(
                        "dropping time zone {} for country {code} because \
                         it is not in catalog version {}",
                        mapping.id,
                        catalog.version(),
                    );
                }
                known
            })
            .collect();
        let default_zone_id = match default_zone_id {
            None => None,
            Some(id)
                if mode == ParseMode::Strict
                    && !mappings.iter().any(|m| &*m.id == id) =>
            {
                return Err(ParseError::from(Repr::DefaultNotCandidate {
                    code,
                    default: id.into(),
                }));
            }
            Some(id) if catalog.has_zone(id) => Some(id.into()),
            Some(id) => {
                warn!(
                    "ignoring default time zone {id} for country {code} \
                     because it is not in catalog version {}",
                    catalog.version(),
                );
                None
            }
        };
        Ok(CountryZones { code, default_zone_id, ever_uses_utc, mappings })
    }

    /// The lowercase country code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns true when this is the given country, compared case
    /// insensitively.
    pub fn is_for_country(&self, code: &str) -> bool {
        self.code.eq_ignore_ascii_case(code)
    }

    /// The default zone for this country, if it has one.
    pub fn default_zone_id(&self) -> Option<&str> {
        self.default_zone_id.as_deref()
    }

    /// Whether the country uses UTC at some point in the year.
    pub fn ever_uses_utc(&self) -> bool {
        self.ever_uses_utc
    }

    /// The identifiers of this country's zones in order of preference.
    pub fn zone_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.mappings.iter().map(|mapping| &*mapping.id)
    }

    /// This country's zones in order of preference.
    pub fn mappings(&self) -> &[TimeZoneMapping] {
        &self.mappings
    }

    /// This country's zones that are still distinct at the given Unix
    /// millisecond.
    pub fn effective_mappings(
        &self,
        when_millis: i64,
    ) -> impl Iterator<Item = &TimeZoneMapping> + '_ {
        self.mappings
            .iter()
            .filter(move |mapping| mapping.is_effective_at(when_millis))
    }
}

/// One zone configured for a country.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct TimeZoneMapping {
    id: Box<str>,
    show_in_picker: bool,
    not_used_after: Option<i64>,
}

impl TimeZoneMapping {
    /// Creates a new mapping.
    pub fn new(
        id: &str,
        show_in_picker: bool,
        not_used_after: Option<i64>,
    ) -> TimeZoneMapping {
        TimeZoneMapping { id: id.into(), show_in_picker, not_used_after }
    }

    /// The zone's identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the zone should be offered to a person choosing a zone.
    pub fn show_in_picker(&self) -> bool {
        self.show_in_picker
    }

    /// The Unix millisecond after which this zone is no longer distinct
    /// from others in the same country.
    pub fn not_used_after(&self) -> Option<i64> {
        self.not_used_after
    }

    /// Returns true when this zone is still distinct at the given Unix
    /// millisecond.
    pub fn is_effective_at(&self, when_millis: i64) -> bool {
        self.not_used_after.map_or(true, |after| when_millis <= after)
    }
}

/// A simplified view of the XML events we care about.
#[derive(Debug)]
enum Node {
    Start { name: String, attrs: Vec<(String, String)>, empty: bool },
    End,
    Text(String),
    Eof,
}

struct Parser<'t> {
    reader: Reader<&'t [u8]>,
}

impl<'t> Parser<'t> {
    fn new(text: &'t str) -> Parser<'t> {
        let mut reader = Reader::from_reader(text.as_bytes());
        reader.config_mut().trim_text(true);
        Parser { reader }
    }

    fn document(
        &mut self,
        mode: ParseMode,
    ) -> Result<CountryZoneIndex, ParseError> {
        let (name, attrs, empty) = loop {
            match self.next()? {
                Node::Start { name, attrs, empty } => {
                    break (name, attrs, empty)
                }
                Node::Text(_) | Node::End => continue,
                Node::Eof => return Err(ParseError::from(Repr::MissingRoot)),
            }
        };
        if name != "timezones" {
            return Err(ParseError::from(Repr::UnexpectedRoot {
                name: name.into(),
            }));
        }
        let iana_version = attr(&attrs, "ianaversion").map(Box::from);
        if empty {
            return Err(ParseError::from(Repr::MissingCountryZones));
        }
        let mut countries = None;
        loop {
            match self.next()? {
                Node::Start { name, empty, .. }
                    if name == "countryzones" && countries.is_none() =>
                {
                    countries = Some(self.country_zones(empty, mode)?);
                }
                Node::Start { empty, .. } => self.skip(empty)?,
                Node::Text(_) => {}
                Node::End => break,
                Node::Eof => return Err(ParseError::from(Repr::Truncated)),
            }
        }
        let Some(mut countries) = countries else {
            return Err(ParseError::from(Repr::MissingCountryZones));
        };
        countries.sort_by(|a: &CountryZones, b| a.code.cmp(&b.code));
        Ok(CountryZoneIndex { iana_version, countries })
    }

    fn country_zones(
        &mut self,
        empty: bool,
        mode: ParseMode,
    ) -> Result<Vec<CountryZones>, ParseError> {
        let mut countries: Vec<CountryZones> = vec![];
        if empty {
            return Ok(countries);
        }
        loop {
            match self.next()? {
                Node::Start { name, attrs, empty } if name == "country" => {
                    let country = self.country(&attrs, empty, mode)?;
                    if countries.iter().any(|c| c.code == country.code) {
                        if mode == ParseMode::Strict {
                            return Err(ParseError::from(
                                Repr::DuplicateCountry { code: country.code },
                            ));
                        }
                        warn!(
                            "ignoring duplicate entry for country {}",
                            country.code,
                        );
                        continue;
                    }
                    countries.push(country);
                }
                Node::Start { empty, .. } => self.skip(empty)?,
                Node::Text(_) => {}
                Node::End => return Ok(countries),
                Node::Eof => return Err(ParseError::from(Repr::Truncated)),
            }
        }
    }

    fn country(
        &mut self,
        attrs: &[(String, String)],
        empty: bool,
        mode: ParseMode,
    ) -> Result<CountryZones, ParseError> {
        let Some(code) = attr(attrs, "code") else {
            return Err(ParseError::missing("country", "code"));
        };
        let code: Box<str> = code.to_ascii_lowercase().into();
        let default_zone_id = attr(attrs, "default").map(Box::<str>::from);
        if mode == ParseMode::Strict && default_zone_id.is_none() {
            return Err(ParseError::missing("country", "default"));
        }
        let ever_uses_utc = flag(attrs, "country", "everutc", false)?;

        let mut mappings = vec![];
        if !empty {
            loop {
                match self.next()? {
                    Node::Start { name, attrs, empty } if name == "id" => {
                        mappings.push(self.id(&attrs, empty)?);
                    }
                    Node::Start { empty, .. } => self.skip(empty)?,
                    Node::Text(_) => {}
                    Node::End => break,
                    Node::Eof => {
                        return Err(ParseError::from(Repr::Truncated))
                    }
                }
            }
        }
        if mode == ParseMode::Strict {
            if let Some(ref default) = default_zone_id {
                if !mappings.iter().any(|m: &TimeZoneMapping| m.id == *default)
                {
                    return Err(ParseError::from(Repr::DefaultNotCandidate {
                        code,
                        default: default.clone(),
                    }));
                }
            }
        }
        Ok(CountryZones { code, default_zone_id, ever_uses_utc, mappings })
    }

    fn id(
        &mut self,
        attrs: &[(String, String)],
        empty: bool,
    ) -> Result<TimeZoneMapping, ParseError> {
        let show_in_picker = flag(attrs, "id", "picker", true)?;
        let not_used_after = match attr(attrs, "notafter") {
            None => None,
            Some(value) => Some(value.parse::<i64>().map_err(|_| {
                ParseError::invalid("id", "notafter", value)
            })?),
        };
        let mut text = String::new();
        if !empty {
            loop {
                match self.next()? {
                    Node::Text(chunk) => text.push_str(&chunk),
                    Node::Start { name, .. } => {
                        return Err(ParseError::from(Repr::UnexpectedChild {
                            parent: "id",
                            child: name.into(),
                        }))
                    }
                    Node::End => break,
                    Node::Eof => {
                        return Err(ParseError::from(Repr::Truncated))
                    }
                }
            }
        }
        let id = text.trim();
        if id.is_empty() {
            return Err(ParseError::from(Repr::EmptyId));
        }
        Ok(TimeZoneMapping::new(id, show_in_picker, not_used_after))
    }

    /// Skips the rest of an element whose start tag was just read.
    fn skip(&mut self, empty: bool) -> Result<(), ParseError> {
        if empty {
            return Ok(());
        }
        let mut depth = 1usize;
        while depth > 0 {
            match self.next()? {
                Node::Start { empty: false, .. } => depth += 1,
                Node::Start { empty: true, .. } | Node::Text(_) => {}
                Node::End => depth -= 1,
                Node::Eof => return Err(ParseError::from(Repr::Truncated)),
            }
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Node, ParseError> {
        loop {
            let event = self.reader.read_event().map_err(|err| self.xml(err))?;
            return Ok(match event {
                Event::Start(ref tag) => self.start(tag, false)?,
                Event::Empty(ref tag) => self.start(tag, true)?,
                Event::End(_) => Node::End,
                Event::Text(ref text) => Node::Text(self.decode(text)?),
                Event::CData(ref data) => Node::Text(self.decode(data)?),
                Event::GeneralRef(ref reference) => {
                    Node::Text(self.reference(reference)?)
                }
                Event::Eof => Node::Eof,
                // Comments, declarations, processing instructions and the
                // like carry nothing we need.
                _ => continue,
            });
        }
    }

    fn start(
        &self,
        tag: &BytesStart<'_>,
        empty: bool,
    ) -> Result<Node, ParseError> {
        let name = self.decode(tag.name().as_ref())?;
        let mut attrs = vec![];
        for attribute in tag.attributes() {
            let attribute = attribute.map_err(|err| self.xml(err))?;
            let key = self.decode(attribute.key.as_ref())?;
            let value = attribute
                .decode_and_unescape_value(self.reader.decoder())
                .map_err(|err| self.xml(err))?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(Node::Start { name, attrs, empty })
    }

    /// Resolves a character or predefined entity reference in text.
    fn reference(
        &self,
        reference: &BytesRef<'_>,
    ) -> Result<String, ParseError> {
        if let Some(ch) =
            reference.resolve_char_ref().map_err(|err| self.xml(err))?
        {
            return Ok(ch.to_string());
        }
        let name = self.decode(reference)?;
        match resolve_xml_entity(&name) {
            Some(text) => Ok(text.to_string()),
            None => Err(self.xml(format_args!("unknown entity `&{name};`"))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, ParseError> {
        let text =
            self.reader.decoder().decode(bytes).map_err(|err| self.xml(err))?;
        Ok(text.into_owned())
    }

    fn xml(&self, err: impl core::fmt::Display) -> ParseError {
        let message =
            format!("at byte {}: {err}", self.reader.buffer_position());
        ParseError::from(Repr::Xml { message: message.into() })
    }
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn flag(
    attrs: &[(String, String)],
    element: &'static str,
    key: &'static str,
    default: bool,
) -> Result<bool, ParseError> {
    match attr(attrs, key) {
        None => Ok(default),
        Some("y") => Ok(true),
        Some("n") => Ok(false),
        Some(value) => Err(ParseError::invalid(element, key, value)),
    }
}

/// An error that occurs when parsing country configuration.
///
/// The specific problem can be inspected with [`ParseError::kind`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
    repr: Repr,
}

impl ParseError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ParseErrorKind {
        match self.repr {
            Repr::Xml { .. } => ParseErrorKind::Xml,
            Repr::MissingRoot => ParseErrorKind::MissingRoot,
            Repr::UnexpectedRoot { .. } => ParseErrorKind::UnexpectedRoot,
            Repr::MissingCountryZones => ParseErrorKind::MissingCountryZones,
            Repr::MissingAttribute { .. } => ParseErrorKind::MissingAttribute,
            Repr::InvalidAttribute { .. } => ParseErrorKind::InvalidAttribute,
            Repr::UnexpectedChild { .. } => ParseErrorKind::UnexpectedChild,
            Repr::EmptyId => ParseErrorKind::EmptyId,
            Repr::DefaultNotCandidate { .. } => {
                ParseErrorKind::DefaultNotCandidate
            }
            Repr::DuplicateCountry { .. } => ParseErrorKind::DuplicateCountry,
            Repr::Truncated => ParseErrorKind::Truncated,
        }
    }

    fn missing(element: &'static str, attribute: &'static str) -> ParseError {
        ParseError::from(Repr::MissingAttribute { element, attribute })
    }

    fn invalid(
        element: &'static str,
        attribute: &'static str,
        value: &str,
    ) -> ParseError {
        ParseError::from(Repr::InvalidAttribute {
            element,
            attribute,
            value: value.into(),
        })
    }
}

/// The category of a [`ParseError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// The document is not well formed XML.
    Xml,
    /// The document has no root element.
    MissingRoot,
    /// The root element is not `timezones`.
    UnexpectedRoot,
    /// The root element has no `countryzones` element.
    MissingCountryZones,
    /// A required attribute is absent.
    MissingAttribute,
    /// An attribute has a value that can't be interpreted.
    InvalidAttribute,
    /// An `id` element contains another element.
    UnexpectedChild,
    /// An `id` element has no text.
    EmptyId,
    /// A country's default zone is not one of its zones.
    DefaultNotCandidate,
    /// A country appears more than once.
    DuplicateCountry,
    /// The document ends inside an element.
    Truncated,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Repr {
    Xml { message: Box<str> },
    MissingRoot,
    UnexpectedRoot { name: Box<str> },
    MissingCountryZones,
    MissingAttribute { element: &'static str, attribute: &'static str },
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: Box<str>,
    },
    UnexpectedChild { parent: &'static str, child: Box<str> },
    EmptyId,
    DefaultNotCandidate { code: Box<str>, default: Box<str> },
    DuplicateCountry { code: Box<str> },
    Truncated,
}

impl From<Repr> for ParseError {
    fn from(repr: Repr) -> ParseError {
        ParseError { repr }
    }
}

impl std::error::Error for ParseError {}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self.repr {
            Repr::Xml { ref message } => {
                write!(f, "invalid country configuration XML {message}")
            }
            Repr::MissingRoot => {
                f.write_str("country configuration has no root element")
            }
            Repr::UnexpectedRoot { ref name } => write!(
                f,
                "expected root element `timezones` in country \
                 configuration, but found `{name}`",
            ),
            Repr::MissingCountryZones => f.write_str(
                "expected `countryzones` element in country configuration",
            ),
            Repr::MissingAttribute { element, attribute } => write!(
                f,
                "`{element}` element is missing required \
                 attribute `{attribute}`",
            ),
            Repr::InvalidAttribute { element, attribute, ref value } => {
                write!(
                    f,
                    "`{element}` element has invalid value \
                     `{value}` for attribute `{attribute}`",
                )
            }
            Repr::UnexpectedChild { parent, ref child } => write!(
                f,
                "unexpected element `{child}` inside `{parent}` element",
            ),
            Repr::EmptyId => f.write_str("found `id` element with no text"),
            Repr::DefaultNotCandidate { ref code, ref default } => write!(
                f,
                "default time zone `{default}` for country `{code}` \
                 is not one of its time zones",
            ),
            Repr::DuplicateCountry { ref code } => write!(
                f,
                "found more than one entry for country `{code}`",
            ),
            Repr::Truncated => {
                f.write_str("country configuration ends inside an element")
            }
        }
    }
}
