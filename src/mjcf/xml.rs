//! Light element tree read with quick-xml.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::util::{Error, Result};

/// One XML element with its attributes in document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn element_from(e: &BytesStart) -> Result<Element> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(Element { name, attrs, children: Vec::new() })
}

/// Parse a document and return its root element.
pub fn parse_document(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => stack.push(element_from(e)?),
            Event::Empty(ref e) => {
                let el = element_from(e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(el),
                    None if root.is_none() => root = Some(el),
                    None => return Err(Error::parse("multiple root elements")),
                }
            }
            Event::End(_) => {
                let Some(el) = stack.pop() else {
                    return Err(Error::parse("unbalanced closing tag"));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(el),
                    None if root.is_none() => root = Some(el),
                    None => return Err(Error::parse("multiple root elements")),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::parse(format!("unclosed element <{}>", stack[stack.len() - 1].name)));
    }
    root.ok_or_else(|| Error::parse("empty document"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree() {
        let root = parse_document(
            r#"<?xml version="1.0"?>
            <!-- comment -->
            <mujoco model="arm">
                <worldbody>
                    <body name="a &amp; b"><geom size="1"/></body>
                </worldbody>
            </mujoco>"#,
        )
        .unwrap();
        assert_eq!(root.name, "mujoco");
        assert_eq!(root.attr("model"), Some("arm"));
        let body = &root.children[0].children[0];
        assert_eq!(body.attr("name"), Some("a & b"));
        assert_eq!(body.children_named("geom").count(), 1);
    }

    #[test]
    fn test_malformed() {
        assert!(parse_document("<mujoco><worldbody></mujoco>").is_err());
        assert!(parse_document("").is_err());
    }
}
