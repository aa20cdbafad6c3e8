//! The XML event driver: reads stylesheet text and feeds start/end/text
//! events to a [`StylesheetBuilder`].

use crate::compiler::StylesheetBuilder;
use crate::error::XsltError;
use crate::util::get_owned_attributes;
use quick_xml::Reader;
use quick_xml::events::Event as XmlEvent;

pub fn parse_stylesheet_content(
    source: &str,
    builder: &mut impl StylesheetBuilder,
) -> Result<(), XsltError> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    loop {
        let pos = reader.buffer_position() as usize;
        match reader.read_event_into(&mut buf)? {
            XmlEvent::Start(e) => {
                let owned = e.to_owned();
                let attributes = get_owned_attributes(&owned)?;
                builder.start_element(&owned, attributes, pos, source)?;
            }
            XmlEvent::Empty(e) => {
                let owned = e.to_owned();
                let attributes = get_owned_attributes(&owned)?;
                builder.empty_element(&owned, attributes, pos, source)?;
            }
            XmlEvent::Text(e) => {
                use quick_xml::escape::unescape;
                let raw = std::str::from_utf8(e.as_ref())?;
                let text = unescape(raw)
                    .map_err(|err| XsltError::Compilation(err.to_string()))?
                    .into_owned();
                builder.text(text)?;
            }
            XmlEvent::CData(e) => {
                let text = std::str::from_utf8(e.as_ref())?.to_string();
                builder.text(text)?;
            }
            XmlEvent::End(e) => {
                builder.end_element(&e.to_owned(), pos, source)?;
            }
            XmlEvent::Eof => break,
            _ => (),
        }
        buf.clear();
    }

    Ok(())
}
