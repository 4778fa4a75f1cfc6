use crate::DecodeError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use std::borrow::Cow;
use std::fmt;

/// An element or attribute name, split at the first `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    prefix: Option<String>,
    local: String,
}

impl Name {
    pub fn new(prefix: Option<&str>, local: &str) -> Name {
        Name {
            prefix: prefix.map(str::to_owned),
            local: local.to_owned(),
        }
    }

    fn from_qname(qname: QName<'_>) -> Result<Name, DecodeError> {
        let local = std::str::from_utf8(qname.local_name().as_ref())?.to_owned();
        let prefix = match qname.prefix() {
            Some(prefix) => Some(std::str::from_utf8(prefix.as_ref())?.to_owned()),
            None => None,
        };
        Ok(Name { prefix, local })
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    /// `prefix:local` patterns match prefix and local name exactly, a bare
    /// `local` pattern matches the local name under any prefix.
    pub fn matches(&self, pattern: &str) -> bool {
        match pattern.split_once(':') {
            Some((prefix, local)) => self.prefix.as_deref() == Some(prefix) && self.local == local,
            None => self.local == pattern,
        }
    }

    fn is_namespace_decl(&self) -> bool {
        match &self.prefix {
            Some(prefix) => prefix == "xmlns",
            None => self.local == "xmlns",
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    name: Name,
    value: String,
}

impl Attr {
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// The opening tag of an element: its name and (unescaped) attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartEl {
    name: Name,
    attributes: Vec<Attr>,
}

impl StartEl {
    fn from_event(start: &BytesStart<'_>) -> Result<StartEl, DecodeError> {
        let name = Name::from_qname(start.name())?;
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            attributes.push(Attr {
                name: Name::from_qname(attr.key)?,
                value: attr.unescape_value()?.into_owned(),
            });
        }
        Ok(StartEl { name, attributes })
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn matches(&self, pattern: &str) -> bool {
        self.name.matches(pattern)
    }

    /// Value of the first attribute matching `pattern`. Namespace
    /// declarations never match.
    pub fn attr(&self, pattern: &str) -> Option<&str> {
        self.attributes
            .iter()
            .filter(|a| !a.name.is_namespace_decl())
            .find(|a| a.name.matches(pattern))
            .map(|a| a.value.as_str())
    }

    pub fn attributes(&self) -> &[Attr] {
        &self.attributes
    }
}

enum Token {
    Start(StartEl),
    End,
    Text(String),
}

/// A token source over one XML document.
///
/// Every decode call owns its own `Document`; nothing is shared between
/// documents, so independent documents can be decoded on different threads.
pub struct Document<'inp> {
    reader: Reader<&'inp [u8]>,
    depth: usize,
    max_depth: usize,
}

/// Deepest element nesting a [`Document`] accepts unless told otherwise.
pub const MAX_DEPTH: usize = 128;

impl<'inp> Document<'inp> {
    pub fn new(input: &'inp str) -> Document<'inp> {
        let mut reader = Reader::from_str(input);
        reader.expand_empty_elements(true);
        reader.trim_text(false);
        Document {
            reader,
            depth: 0,
            max_depth: MAX_DEPTH,
        }
    }

    /// Fails decoding with [`DecodeError::TooDeep`] once elements nest
    /// deeper than `max_depth`.
    pub fn with_max_depth(mut self, max_depth: usize) -> Document<'inp> {
        self.max_depth = max_depth;
        self
    }

    pub fn try_from_bytes(input: &'inp [u8]) -> Result<Document<'inp>, DecodeError> {
        Ok(Document::new(std::str::from_utf8(input)?))
    }

    fn next_token(&mut self) -> Result<Option<Token>, DecodeError> {
        loop {
            let token = match self.reader.read_event()? {
                Event::Start(start) => {
                    if self.depth == self.max_depth {
                        return Err(DecodeError::TooDeep(self.max_depth));
                    }
                    self.depth += 1;
                    Token::Start(StartEl::from_event(&start)?)
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                    Token::End
                }
                Event::Text(text) => Token::Text(text.unescape()?.into_owned()),
                Event::CData(data) => Token::Text(std::str::from_utf8(&data)?.to_owned()),
                Event::Eof => return Ok(None),
                _ => continue,
            };
            return Ok(Some(token));
        }
    }

    /// Positions the document at its root element.
    pub fn root_element(&mut self) -> Result<ScopedDecoder<'inp, '_>, DecodeError> {
        loop {
            match self.next_token()? {
                Some(Token::Start(start_el)) => {
                    let depth = self.depth;
                    return Ok(ScopedDecoder {
                        doc: self,
                        start_el,
                        depth,
                        closed: false,
                    });
                }
                Some(_) => {}
                None => return Err(DecodeError::NoRoot),
            }
        }
    }
}

/// A view of a single element of a [`Document`].
///
/// Reading through the decoder never leaves its element. Children that were
/// handed out by [`ScopedDecoder::next_tag`] and not read to the end are
/// skipped, subtree included, on the next call, so callers can drop any
/// child they do not recognize.
pub struct ScopedDecoder<'inp, 'a> {
    doc: &'a mut Document<'inp>,
    start_el: StartEl,
    depth: usize,
    closed: bool,
}

impl<'inp> ScopedDecoder<'inp, '_> {
    pub fn start_el(&self) -> &StartEl {
        &self.start_el
    }

    pub fn expect_element(&self, pattern: &'static str) -> Result<(), DecodeError> {
        if self.start_el.matches(pattern) {
            Ok(())
        } else {
            Err(DecodeError::UnexpectedElement {
                expected: Cow::Borrowed(pattern),
                got: self.start_el.name.to_string(),
            })
        }
    }

    /// The next direct child element, or `None` once this element closes.
    pub fn next_tag(&mut self) -> Result<Option<ScopedDecoder<'inp, '_>>, DecodeError> {
        while !self.closed {
            let depth = self.doc.depth;
            match self.doc.next_token()? {
                Some(Token::Start(start_el)) if self.doc.depth == self.depth + 1 => {
                    let depth = self.doc.depth;
                    return Ok(Some(ScopedDecoder {
                        doc: &mut *self.doc,
                        start_el,
                        depth,
                        closed: false,
                    }));
                }
                Some(Token::End) if depth == self.depth => self.closed = true,
                Some(_) => {}
                None => return Err(self.unterminated()),
            }
        }
        Ok(None)
    }

    /// Concatenated text directly inside this element; nested elements are
    /// skipped. Consumes the element.
    pub fn read_text(&mut self) -> Result<String, DecodeError> {
        let mut text = String::new();
        while !self.closed {
            let depth = self.doc.depth;
            match self.doc.next_token()? {
                Some(Token::Text(chunk)) if depth == self.depth => text.push_str(&chunk),
                Some(Token::End) if depth == self.depth => self.closed = true,
                Some(_) => {}
                None => return Err(self.unterminated()),
            }
        }
        Ok(text)
    }

    /// Consumes the rest of this element.
    pub fn skip(&mut self) -> Result<(), DecodeError> {
        while self.next_tag()?.is_some() {}
        Ok(())
    }

    fn unterminated(&self) -> DecodeError {
        DecodeError::Unterminated(self.start_el.name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn names_match_with_and_without_prefix() {
        let prefixed = Name::new(Some("prefix"), "local");
        assert!(prefixed.matches("prefix:local"));
        assert!(prefixed.matches("local"));
        assert!(!prefixed.matches("other:local"));

        let bare = Name::new(None, "local");
        assert!(bare.matches("local"));
        assert!(!bare.matches("prefix:local"));
        assert_eq!(prefixed.to_string(), "prefix:local");
    }

    #[test]
    fn children_are_visited_in_order() {
        let mut doc = Document::new("<a><b>1</b><c>2</c></a>");
        let mut root = doc.root_element().unwrap();
        assert!(root.start_el().matches("a"));

        let mut seen = vec![];
        while let Some(mut tag) = root.next_tag().unwrap() {
            let name = tag.start_el().name().local().to_owned();
            seen.push((name, tag.read_text().unwrap()));
        }
        assert_eq!(seen, [("b".to_owned(), "1".to_owned()), ("c".to_owned(), "2".to_owned())]);
    }

    #[test]
    fn unread_children_are_skipped_with_their_subtree() {
        let xml = indoc! {r#"
            <root>
                <skip><deep><deeper>x</deeper></deep><deep/></skip>
                <keep>yes</keep>
            </root>
        "#};
        let mut doc = Document::new(xml);
        let mut root = doc.root_element().unwrap();
        let mut kept = None;
        while let Some(mut tag) = root.next_tag().unwrap() {
            if tag.start_el().matches("keep") {
                kept = Some(tag.read_text().unwrap());
            }
        }
        assert_eq!(kept.as_deref(), Some("yes"));
    }

    #[test]
    fn text_ignores_nested_elements() {
        let mut doc = Document::new("<a>hello <b>ignored</b>world</a>");
        let mut root = doc.root_element().unwrap();
        assert_eq!(root.read_text().unwrap(), "hello world");
        assert!(root.next_tag().unwrap().is_none());
    }

    #[test]
    fn text_is_unescaped_and_cdata_is_kept() {
        let mut doc = Document::new("<a>&lt;b&gt; <![CDATA[<c/>]]></a>");
        let mut root = doc.root_element().unwrap();
        assert_eq!(root.read_text().unwrap(), "<b> <c/>");
    }

    #[test]
    fn self_closing_elements_have_no_children() {
        let mut doc = Document::new(r#"<a><b x="1"/><c>2</c></a>"#);
        let mut root = doc.root_element().unwrap();
        let mut b = root.next_tag().unwrap().unwrap();
        assert_eq!(b.start_el().attr("x"), Some("1"));
        assert!(b.next_tag().unwrap().is_none());
        drop(b);
        let mut c = root.next_tag().unwrap().unwrap();
        assert_eq!(c.read_text().unwrap(), "2");
    }

    #[test]
    fn attributes_skip_namespace_declarations() {
        let mut doc = Document::new(r#"<a xmlns:p="urn:p" xmlns="urn:d" p:id="7" name="n"/>"#);
        let root = doc.root_element().unwrap();
        assert_eq!(root.start_el().attr("p:id"), Some("7"));
        assert_eq!(root.start_el().attr("id"), Some("7"));
        assert_eq!(root.start_el().attr("name"), Some("n"));
        assert_eq!(root.start_el().attr("p"), None);
        assert_eq!(root.start_el().attr("xmlns"), None);
    }

    #[test]
    fn unterminated_elements_are_errors() {
        let mut doc = Document::new("<a><b>text</b>");
        let mut root = doc.root_element().unwrap();
        let mut b = root.next_tag().unwrap().unwrap();
        assert_eq!(b.read_text().unwrap(), "text");
        drop(b);
        let err = root.next_tag().err().expect("document ends inside <a>");
        assert!(matches!(err, DecodeError::Unterminated(_) | DecodeError::Xml(_)), "{err}");
    }

    #[test]
    fn mismatched_end_tags_are_errors() {
        let mut doc = Document::new("<a><b></c></a>");
        let mut root = doc.root_element().unwrap();
        let result = root.skip();
        assert!(matches!(result, Err(DecodeError::Xml(_))));
    }

    #[test]
    fn nesting_is_bounded() {
        let xml = format!("{}{}", "<a>".repeat(4), "</a>".repeat(4));
        let mut doc = Document::new(&xml).with_max_depth(3);
        let mut root = doc.root_element().unwrap();
        let err = root.skip().unwrap_err();
        assert!(matches!(err, DecodeError::TooDeep(3)), "{err}");

        let mut doc = Document::new(&xml).with_max_depth(4);
        let mut root = doc.root_element().unwrap();
        root.skip().unwrap();
    }

    #[test]
    fn empty_document_has_no_root() {
        let mut doc = Document::new("<?xml version=\"1.0\"?><!-- nothing -->");
        assert!(matches!(doc.root_element(), Err(DecodeError::NoRoot)));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        assert!(matches!(Document::try_from_bytes(&[0x3c, 0xff, 0x3e]), Err(DecodeError::Utf8(_))));
    }

    #[test]
    fn expect_element_reports_the_found_name() {
        let mut doc = Document::new("<p:Other/>");
        let root = doc.root_element().unwrap();
        let err = root.expect_element("Wanted").unwrap_err();
        assert_eq!(err.to_string(), "expected <Wanted>, got <p:Other>");
    }
}
