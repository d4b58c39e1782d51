use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Maximum element nesting accepted in a feed document.
const MAX_DEPTH: usize = 64;

/// An RSS 2.0 document as delivered by a feed URL.
///
/// Only the fields the aggregator stores are kept; everything else in the
/// channel (images, categories, namespaced extensions) is skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RssFeed {
    pub channel: RssChannel,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RssChannel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<RssItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RssItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw `pubDate` text; see [`crate::feed::parse_pub_date`]
    pub pub_date: String,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("document has no <channel> element")]
    MissingChannel,

    #[error("document ends inside <{0}>")]
    Truncated(String),

    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

// ============================================================================
// Element Matching
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
}

impl Field {
    /// Names are compared with their prefix, so `atom:link` or
    /// `itunes:title` never stand in for the core RSS elements.
    fn of_channel(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"link" => Some(Self::Link),
            b"description" => Some(Self::Description),
            _ => None,
        }
    }

    fn of_item(name: &[u8]) -> Option<Self> {
        match name {
            b"pubDate" => Some(Self::PubDate),
            _ => Self::of_channel(name),
        }
    }
}

/// Text being collected for one field element.
struct Capture {
    field: Field,
    in_item: bool,
    /// Depth of the field element itself; nested markup sits deeper.
    depth: usize,
    text: String,
}

impl RssChannel {
    fn slot(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Title => Some(&mut self.title),
            Field::Link => Some(&mut self.link),
            Field::Description => Some(&mut self.description),
            Field::PubDate => None,
        }
    }
}

impl RssItem {
    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::PubDate => &mut self.pub_date,
        }
    }
}

/// Store `text` unless an earlier element already filled the slot.
///
/// XML decoding resolves one level of entities; feeds commonly double-encode
/// (`&amp;amp;`, `&amp;#8217;`), so a second, HTML-aware pass runs on top.
fn fill(slot: &mut String, text: &str) {
    if slot.is_empty() {
        *slot = html_escape::decode_html_entities(text.trim()).into_owned();
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode an RSS body into its channel and items.
///
/// Only the unprefixed `channel/{title,link,description}` and
/// `item/{title,link,description,pubDate}` elements are read. Markup nested
/// inside them contributes its text; every other element is skipped. The
/// `encoding` named in the XML declaration is honoured.
///
/// # Security
///
/// `quick-xml` (0.37) does not expand `<!ENTITY>` declarations. Unknown
/// entity references are kept as literal text instead of being resolved.
pub fn decode_feed(bytes: &[u8]) -> Result<RssFeed, DecodeError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut channel: Option<RssChannel> = None;
    let mut item: Option<RssItem> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                path.push(name);
                let depth = path.len();
                if depth > MAX_DEPTH {
                    return Err(DecodeError::MaxDepthExceeded(MAX_DEPTH));
                }

                if capture.is_none() {
                    let name = path[depth - 1].as_slice();
                    let parent = depth.checked_sub(2).map(|i| path[i].as_slice());
                    match (depth, parent, name) {
                        (2, _, b"channel") if channel.is_none() => {
                            channel = Some(RssChannel::default());
                        }
                        (3, Some(b"channel"), b"item") if channel.is_some() => {
                            item = Some(RssItem::default());
                        }
                        (3, Some(b"channel"), _) if channel.is_some() => {
                            capture = Field::of_channel(name).map(|field| Capture {
                                field,
                                in_item: false,
                                depth,
                                text: String::new(),
                            });
                        }
                        (4, Some(b"item"), _) if item.is_some() => {
                            capture = Field::of_item(name).map(|field| Capture {
                                field,
                                in_item: true,
                                depth,
                                text: String::new(),
                            });
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(_)) => {
                let depth = path.len();
                if capture.as_ref().is_some_and(|c| c.depth == depth) {
                    if let Some(done) = capture.take() {
                        if done.in_item {
                            if let Some(item) = item.as_mut() {
                                fill(item.slot(done.field), &done.text);
                            }
                        } else if let Some(slot) =
                            channel.as_mut().and_then(|c| c.slot(done.field))
                        {
                            fill(slot, &done.text);
                        }
                    }
                } else if depth == 3 && path.last().is_some_and(|n| n.as_slice() == b"item") {
                    if let (Some(channel), Some(done)) = (channel.as_mut(), item.take()) {
                        channel.items.push(done);
                    }
                }
                path.pop();
            }
            Ok(Event::Text(e)) => {
                if let Some(capture) = capture.as_mut() {
                    let text = match e.unescape() {
                        Ok(text) => text.into_owned(),
                        // Undeclared entities such as &nbsp; are left for the HTML pass
                        Err(_) => decode_text(&reader, &e),
                    };
                    capture.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(capture) = capture.as_mut() {
                    capture.text.push_str(&decode_text(&reader, &e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DecodeError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = path.last() {
        return Err(DecodeError::Truncated(String::from_utf8_lossy(open).into_owned()));
    }
    let channel = channel.ok_or(DecodeError::MissingChannel)?;
    Ok(RssFeed { channel })
}

/// Decode raw bytes with the document's declared encoding.
fn decode_text(reader: &Reader<&[u8]>, raw: &[u8]) -> String {
    match reader.decoder().decode(raw) {
        Ok(text) => text.into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "Feed text is not valid in its declared encoding, replacing bad bytes");
            String::from_utf8_lossy(raw).into_owned()
        }
    }
}
