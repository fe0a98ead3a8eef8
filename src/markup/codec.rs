//! XML parse/serialize with the namespace cleanup fiscal consumers expect.
//!
//! Signed NFe documents carry `ds:`-prefixed signature blocks and CTe files
//! produced by some emitters use an `ns0:` prefix; downstream readers want
//! canonical unprefixed tags, so serialization rewrites both after emitting.

use quick_xml::Reader;
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use super::node::{Declaration, Document, Element, Node};

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Parse failures. Any of these makes the input unusable for the batch.
#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    #[error("input is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("XML syntax error at byte {position}: {source}")]
    Syntax {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("invalid attribute in <{element}>: {detail}")]
    Attribute { element: String, detail: String },

    #[error("unexpected closing tag </{0}>")]
    UnexpectedClose(String),

    #[error("element <{0}> is never closed")]
    Unclosed(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("content after the root element <{0}>")]
    TrailingRoot(String),
}

/// One textual rewrite applied to the serialized output.
#[derive(Debug, Clone)]
struct Rewrite {
    pattern: Regex,
    replacement: &'static str,
}

/// Stateless XML codec. Construct once per batch and share by reference.
#[derive(Debug, Clone)]
pub struct XmlCodec {
    rewrites: Vec<Rewrite>,
}

impl Default for XmlCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlCodec {
    pub fn new() -> Self {
        // (pattern, replacement), order matters
        let rules: [(&str, &'static str); 7] = [
            (r#" xmlns:ds="http://www\.w3\.org/2000/09/xmldsig#""#, ""),
            (r"<ds:Signature", r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#""#),
            (r"</ds:Signature", "</Signature"),
            (r"<(/?)ds:", "<$1"),
            (r">\s+<", "><"),
            (r"<(/?)ns0:", "<$1"),
            (r#"\s?xmlns:ns0="http://www\.portalfiscal\.inf\.br/cte""#, ""),
        ];
        // patterns are literals exercised by the tests below
        let rewrites = rules
            .into_iter()
            .filter_map(|(p, replacement)| {
                Regex::new(p)
                    .ok()
                    .map(|pattern| Rewrite { pattern, replacement })
            })
            .collect();
        Self { rewrites }
    }

    /// Parse raw bytes into a [`Document`].
    pub fn parse(&self, bytes: &[u8]) -> Result<Document, MarkupError> {
        let text = std::str::from_utf8(bytes)?;
        let mut reader = Reader::from_str(text);
        reader
            .config_mut()
            .trim_text(false);

        let mut declaration = None;
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|source| MarkupError::Syntax {
                    position: reader.buffer_position() as u64,
                    source,
                })?;
            match event {
                Event::Decl(ref d) => {
                    declaration = Some(read_declaration(d));
                }
                Event::Start(ref e) => {
                    if root.is_some() && stack.is_empty() {
                        return Err(MarkupError::TrailingRoot(qualified_name(e)));
                    }
                    stack.push(read_element(e)?);
                }
                Event::Empty(ref e) => {
                    if root.is_some() && stack.is_empty() {
                        return Err(MarkupError::TrailingRoot(qualified_name(e)));
                    }
                    let mut el = read_element(e)?;
                    el.self_closing = true;
                    attach(&mut stack, &mut root, el);
                }
                Event::End(ref e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let el = stack
                        .pop()
                        .ok_or_else(|| MarkupError::UnexpectedClose(name))?;
                    attach(&mut stack, &mut root, el);
                }
                Event::Text(ref e) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|source| MarkupError::Syntax {
                                position: reader.buffer_position() as u64,
                                source,
                            })?;
                        parent
                            .children
                            .push(Node::Text(text.into_owned()));
                    }
                }
                Event::CData(ref e) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = String::from_utf8_lossy(e).into_owned();
                        parent
                            .children
                            .push(Node::CData(raw));
                    }
                }
                Event::Comment(ref e) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = String::from_utf8_lossy(e).into_owned();
                        parent
                            .children
                            .push(Node::Comment(raw));
                    }
                }
                Event::Eof => break,
                // processing instructions and doctypes carry nothing we keep
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(MarkupError::Unclosed(open.name));
        }
        let root = root.ok_or(MarkupError::NoRoot)?;
        Ok(Document { declaration, root })
    }

    /// Serialize and apply the cleanup rewrites. Never fails.
    pub fn serialize(&self, doc: &Document) -> String {
        let mut out = String::with_capacity(4096);
        if let Some(decl) = &doc.declaration {
            write_declaration(&mut out, decl);
        }
        write_element(&mut out, &doc.root);
        self.cleanup(&out)
    }

    /// The fixed rewrite chain; idempotent on its own output.
    pub fn cleanup(&self, raw: &str) -> String {
        let mut text = raw.to_string();
        for rw in &self.rewrites {
            text = rw
                .pattern
                .replace_all(&text, rw.replacement)
                .into_owned();
        }
        let mut text = text.trim().to_string();
        if !text.starts_with("<?xml") {
            text.insert_str(0, XML_DECLARATION);
        }
        text
    }
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn read_element(e: &BytesStart<'_>) -> Result<Element, MarkupError> {
    let mut el = Element::new(qualified_name(e));
    for attr in e.attributes() {
        let attr = attr.map_err(|err| MarkupError::Attribute {
            element: el.name.clone(),
            detail: err.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| MarkupError::Attribute {
                element: el.name.clone(),
                detail: err.to_string(),
            })?
            .into_owned();
        el.attributes
            .insert(key, value);
    }
    Ok(el)
}

fn read_declaration(d: &quick_xml::events::BytesDecl<'_>) -> Declaration {
    fn lossy(b: &[u8]) -> String {
        String::from_utf8_lossy(b).into_owned()
    }
    Declaration {
        version: d
            .version()
            .map(|v| lossy(&v))
            .unwrap_or_else(|_| "1.0".to_string()),
        encoding: d
            .encoding()
            .and_then(Result::ok)
            .map(|v| lossy(&v)),
        standalone: d
            .standalone()
            .and_then(Result::ok)
            .map(|v| lossy(&v)),
    }
}

/// Close `el` into its parent, or make it the root when the stack is empty.
fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent
            .children
            .push(Node::Element(el)),
        None => *root = Some(el),
    }
}

fn write_declaration(out: &mut String, decl: &Declaration) {
    out.push_str("<?xml version=\"");
    out.push_str(&decl.version);
    out.push('"');
    if let Some(enc) = &decl.encoding {
        out.push_str(" encoding=\"");
        out.push_str(enc);
        out.push('"');
    }
    if let Some(sa) = &decl.standalone {
        out.push_str(" standalone=\"");
        out.push_str(sa);
        out.push('"');
    }
    out.push_str("?>");
}

fn write_element(out: &mut String, el: &Element) {
    out.push('<');
    out.push_str(&el.name);
    for (k, v) in &el.attributes {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&escape(v.as_str()));
        out.push('"');
    }
    if el.self_closing && el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        match child {
            Node::Element(c) => write_element(out, c),
            Node::Text(t) => out.push_str(&partial_escape(t.as_str())),
            Node::CData(t) => {
                out.push_str("<![CDATA[");
                out.push_str(t);
                out.push_str("]]>");
            }
            Node::Comment(t) => {
                out.push_str("<!--");
                out.push_str(t);
                out.push_str("-->");
            }
        }
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNED: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc versao="4.00" xmlns="http://www.portalfiscal.inf.br/nfe">
  <NFe>
    <infNFe Id="NFe123" versao="4.00"><ide><nNF>7</nNF></ide></infNFe>
    <ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
      <ds:SignedInfo><ds:Reference URI="#NFe123"/></ds:SignedInfo>
    </ds:Signature>
  </NFe>
</nfeProc>
"##;

    #[test]
    fn parse_keeps_order_attributes_and_prefixes() {
        let codec = XmlCodec::new();
        let doc = codec
            .parse(SIGNED.as_bytes())
            .unwrap();
        assert_eq!(doc.root.name, "nfeProc");
        let keys: Vec<_> = doc
            .root
            .attributes
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["versao", "xmlns"]);
        let sig = doc
            .find("Signature")
            .unwrap();
        assert_eq!(sig.name, "ds:Signature");
        assert_eq!(doc.text_at("infNFe/ide/nNF").as_deref(), Some("7"));
    }

    #[test]
    fn serialize_applies_signature_cleanup() {
        let codec = XmlCodec::new();
        let doc = codec
            .parse(SIGNED.as_bytes())
            .unwrap();
        let out = codec.serialize(&doc);
        insta::assert_snapshot!(out, @r##"<?xml version="1.0" encoding="UTF-8"?><nfeProc versao="4.00" xmlns="http://www.portalfiscal.inf.br/nfe"><NFe><infNFe Id="NFe123" versao="4.00"><ide><nNF>7</nNF></ide></infNFe><Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo><Reference URI="#NFe123"/></SignedInfo></Signature></NFe></nfeProc>"##);
    }

    #[test]
    fn serialize_is_idempotent_on_clean_output() {
        let codec = XmlCodec::new();
        let once = codec.serialize(
            &codec
                .parse(SIGNED.as_bytes())
                .unwrap(),
        );
        let twice = codec.serialize(
            &codec
                .parse(once.as_bytes())
                .unwrap(),
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn cte_prefix_and_namespace_are_stripped() {
        let codec = XmlCodec::new();
        let raw = r#"<ns0:cteProc xmlns:ns0="http://www.portalfiscal.inf.br/cte" versao="4.00"><ns0:CTe><ns0:infCte Id="CTe1"/></ns0:CTe></ns0:cteProc>"#;
        let out = codec.serialize(
            &codec
                .parse(raw.as_bytes())
                .unwrap(),
        );
        assert_eq!(
            out,
            r#"<?xml version="1.0" encoding="UTF-8"?><cteProc versao="4.00"><CTe><infCte Id="CTe1"/></CTe></cteProc>"#
        );
    }

    #[test]
    fn declaration_is_prepended_when_missing() {
        let codec = XmlCodec::new();
        let out = codec.serialize(
            &codec
                .parse(b"<a>x &amp; y</a>")
                .unwrap(),
        );
        assert_eq!(out, format!("{XML_DECLARATION}<a>x &amp; y</a>"));
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        let codec = XmlCodec::new();
        assert!(matches!(codec.parse(b""), Err(MarkupError::NoRoot)));
        assert!(matches!(codec.parse(b"<a><b></a>"), Err(MarkupError::Syntax { .. })));
        assert!(matches!(
            codec.parse(b"<a><b>"),
            Err(MarkupError::Unclosed(_) | MarkupError::Syntax { .. })
        ));
        assert!(matches!(codec.parse(b"<a/><b/>"), Err(MarkupError::TrailingRoot(_))));
        assert!(matches!(codec.parse(&[0xff, 0xfe]), Err(MarkupError::Encoding(_))));
    }
}
