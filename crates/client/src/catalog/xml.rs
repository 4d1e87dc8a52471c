//! Typed intermediate representation of upstream XML.
//!
//! Parsing happens in two steps. [`parse_document`] reads the raw text into a
//! generic [`Element`] tree; [`RawItem::from_element`] then lifts each `<item>`
//! into a record whose fields are explicitly present or absent. The strict
//! domain records are built from `RawItem` in the normalize module.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::CatalogError;

/// A parsed XML element with its attributes, text and children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// `value` attribute of the first child called `name`.
    pub fn child_value(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|child| child.attr("value"))
    }

    /// Trimmed text of the first child called `name`, if non-empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.text.trim()).filter(|text| !text.is_empty())
    }
}

fn start_element(start: &BytesStart<'_>) -> Result<Element, CatalogError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| CatalogError::Parse(format!("bad attribute on <{name}>: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(e) => {
                tracing::debug!("keeping raw value of {}.{}: {}", name, key, e);
                String::from_utf8_lossy(&attr.value).into_owned()
            }
        };
        attributes.push((key, value));
    }
    Ok(Element { name, attributes, ..Default::default() })
}

/// Read an XML document into an element tree and return its root.
///
/// # Errors
///
/// Returns `CatalogError::Parse` for malformed XML, mismatched or unclosed tags,
/// or a document without a root element.
pub fn parse_document(xml: &str) -> Result<Element, CatalogError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(start_element(&start)?),
            Ok(Event::Empty(start)) => {
                let element = start_element(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| CatalogError::Parse("closing tag without opening tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                if let Some(current) = stack.last_mut() {
                    match text.unescape() {
                        Ok(unescaped) => current.text.push_str(&unescaped),
                        Err(_) => current.text.push_str(&String::from_utf8_lossy(&text)),
                    }
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(CatalogError::Parse(format!(
                    "malformed XML at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(CatalogError::Parse(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| CatalogError::Parse("document has no root element".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<(), CatalogError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(CatalogError::Parse("multiple root elements".to_string())),
    }
    Ok(())
}

/// Kind of an item's `<name>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameKind {
    Primary,
    Alternate,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawName {
    pub kind: NameKind,
    pub value: String,
}

/// Kind of an item's `<link>` element, from its `type` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Category,
    Mechanic,
    Designer,
    Publisher,
    Other(String),
}

impl LinkKind {
    fn from_type(link_type: &str) -> Self {
        match link_type {
            "boardgamecategory" => Self::Category,
            "boardgamemechanic" => Self::Mechanic,
            "boardgamedesigner" => Self::Designer,
            "boardgamepublisher" => Self::Publisher,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    pub kind: LinkKind,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRank {
    pub name: String,
    pub value: Option<u32>,
}

/// Contents of `<statistics><ratings>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRatings {
    pub users_rated: Option<u32>,
    pub average: Option<f64>,
    pub bayes_average: Option<f64>,
    pub ranks: Vec<RawRank>,
}

/// One `<item>` with every field explicitly present or absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub id: Option<u32>,
    pub item_type: Option<String>,
    pub names: Vec<RawName>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub thumbnail: Option<String>,
    pub year_published: Option<i32>,
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
    pub playing_time: Option<u32>,
    pub min_playing_time: Option<u32>,
    pub max_playing_time: Option<u32>,
    pub min_age: Option<u32>,
    pub links: Vec<RawLink>,
    pub ratings: Option<RawRatings>,
}

/// Parse a numeric attribute value; missing, empty and unparsable values are `None`.
pub fn parse_number<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.map(str::trim).filter(|v| !v.is_empty()).and_then(|v| v.parse().ok())
}

impl RawItem {
    pub fn from_element(item: &Element) -> Self {
        let names = item
            .children_named("name")
            .filter_map(|name| {
                let value = name.attr("value").map(str::trim).filter(|v| !v.is_empty())?;
                let kind = match name.attr("type") {
                    Some("primary") => NameKind::Primary,
                    Some("alternate") => NameKind::Alternate,
                    other => NameKind::Other(other.unwrap_or_default().to_string()),
                };
                Some(RawName { kind, value: value.to_string() })
            })
            .collect();

        let links = item
            .children_named("link")
            .filter_map(|link| {
                let value = link.attr("value").map(str::trim).filter(|v| !v.is_empty())?;
                Some(RawLink { kind: LinkKind::from_type(link.attr("type").unwrap_or_default()), value: value.to_string() })
            })
            .collect();

        let ratings = item.child("statistics").and_then(|stats| stats.child("ratings")).map(|ratings| RawRatings {
            users_rated: parse_number(ratings.child_value("usersrated")),
            average: parse_number(ratings.child_value("average")),
            bayes_average: parse_number(ratings.child_value("bayesaverage")),
            ranks: ratings
                .child("ranks")
                .map(|ranks| {
                    ranks
                        .children_named("rank")
                        .map(|rank| RawRank {
                            name: rank.attr("name").unwrap_or_default().to_string(),
                            value: parse_number(rank.attr("value")),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        });

        Self {
            id: parse_number(item.attr("id")),
            item_type: item.attr("type").map(str::to_string),
            names,
            description: item.child("description").map(|d| d.text.clone()),
            image: item.child_text("image").map(str::to_string),
            thumbnail: item.child_text("thumbnail").map(str::to_string),
            year_published: parse_number(item.child_value("yearpublished")),
            min_players: parse_number(item.child_value("minplayers")),
            max_players: parse_number(item.child_value("maxplayers")),
            playing_time: parse_number(item.child_value("playingtime")),
            min_playing_time: parse_number(item.child_value("minplaytime")),
            max_playing_time: parse_number(item.child_value("maxplaytime")),
            min_age: parse_number(item.child_value("minage")),
            links,
            ratings,
        }
    }

    /// Primary name, falling back to the first name listed.
    pub fn primary_name(&self) -> Option<&str> {
        self.names
            .iter()
            .find(|name| name.kind == NameKind::Primary)
            .or_else(|| self.names.first())
            .map(|name| name.value.as_str())
    }

    pub fn link_values(&self, kind: &LinkKind) -> Vec<String> {
        self.links.iter().filter(|link| &link.kind == kind).map(|link| link.value.clone()).collect()
    }
}
