//! Embedded `_setup.xml` deployment manifest handling.
//!
//! Windows CE cabinets carry a `_setup.xml` provisioning document mapping
//! install-time file names to the short source names stored in the cabinet:
//!
//! ```xml
//! <wap-provisioningdoc>
//!   <characteristic type="Install">
//!     <parm name="NumFiles" value="2"/>
//!   </characteristic>
//!   <characteristic type="FileOperation">
//!     <characteristic type="\Windows" translation="install">
//!       <characteristic type="app.exe" translation="install">
//!         <characteristic type="Extract">
//!           <parm name="Source" value="APP~1.EXE"/>
//!         </characteristic>
//!       </characteristic>
//!     </characteristic>
//!   </characteristic>
//! </wap-provisioningdoc>
//! ```
//!
//! [`SetupManifest`] keeps the whole document tree so that provisioning
//! content unrelated to file mappings survives a rewrite untouched. The
//! editor synchronizes the mapping on add/remove; `NumFiles` under the
//! Install characteristic tracks the mapping count. Input tolerates UTF-8,
//! UTF-16LE, and Latin-1 encodings; synchronized output is always well-formed
//! UTF-8.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Errors from manifest decoding or re-serialization.
///
/// A parse failure on load is downgraded by the cabinet parser to a recorded
/// warning, since the manifest is ancillary metadata rather than archive
/// structure.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// The XML is not well-formed.
    #[error("malformed manifest XML: {0}")]
    Xml(String),

    /// The document contains no root element.
    #[error("manifest has no root element")]
    NoRoot,
}

/// One file mapping from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Install-time display name (the file node's `type` attribute).
    pub name: String,
    /// Source name inside the cabinet (the Extract `Source` parm).
    pub source: String,
    /// Install directory (the parent characteristic's `type` attribute).
    pub directory: String,
}

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set_attr(&mut self, key: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((key.to_string(), value.to_string())),
        }
    }

    fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First direct child `characteristic` with the given `type` attribute.
    fn characteristic(&self, type_attr: &str) -> Option<&Element> {
        self.child_elements()
            .find(|e| e.name == "characteristic" && e.attr("type") == Some(type_attr))
    }

    fn characteristic_mut(&mut self, type_attr: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e)
                if e.name == "characteristic" && e.attr("type") == Some(type_attr) =>
            {
                Some(e)
            }
            _ => None,
        })
    }

    /// First direct child `parm` with the given `name` attribute.
    fn parm_mut(&mut self, name_attr: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.name == "parm" && e.attr("name") == Some(name_attr) => Some(e),
            _ => None,
        })
    }
}

/// The decoded `_setup.xml` document and its file mapping view.
#[derive(Debug, Clone)]
pub struct SetupManifest {
    root: Element,
}

impl SetupManifest {
    /// Decodes manifest bytes, tolerating UTF-8, UTF-16LE, and Latin-1.
    pub fn parse(raw: &[u8]) -> Result<Self, ManifestError> {
        let text = decode_text(raw);
        let root = parse_tree(&text)?;
        Ok(Self { root })
    }

    /// Builds a minimal empty manifest (used by tests and hosts creating
    /// cabinets from scratch).
    pub fn empty() -> Self {
        let mut root = Element::new("wap-provisioningdoc");
        let mut install = Element::new("characteristic");
        install.set_attr("type", "Install");
        let mut numfiles = Element::new("parm");
        numfiles.set_attr("name", "NumFiles");
        numfiles.set_attr("value", "0");
        install.children.push(Node::Element(numfiles));
        let mut fileop = Element::new("characteristic");
        fileop.set_attr("type", "FileOperation");
        root.children.push(Node::Element(install));
        root.children.push(Node::Element(fileop));
        Self { root }
    }

    /// All file mappings, in document order.
    pub fn entries(&self) -> Vec<ManifestEntry> {
        let mut out = Vec::new();
        let Some(fileop) = self.root.characteristic("FileOperation") else {
            return out;
        };
        collect_entries(fileop, &mut out);
        out
    }

    /// Whether a mapping with this source name exists (case-insensitive).
    pub fn contains_source(&self, source: &str) -> bool {
        self.entries()
            .iter()
            .any(|e| e.source.eq_ignore_ascii_case(source))
    }

    /// The install directory mapped for a source name, if any.
    pub fn directory_of(&self, source: &str) -> Option<&str> {
        let fileop = self.root.characteristic("FileOperation")?;
        find_directory(fileop, source, "")
    }

    /// Sorted list of install directories referenced by the mapping.
    pub fn directories(&self) -> Vec<String> {
        let mut dirs: Vec<String> = self
            .entries()
            .into_iter()
            .map(|e| e.directory)
            .filter(|d| d.starts_with('\\'))
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }

    /// Inserts a file mapping, returning whether the document changed.
    ///
    /// The node lands under the named directory when one matches, otherwise
    /// under the first `translation="install"` characteristic, otherwise
    /// directly under FileOperation. A no-op when the document has no
    /// FileOperation section.
    pub fn insert(&mut self, display_name: &str, source: &str, directory: Option<&str>) -> bool {
        let Some(fileop) = self.root.characteristic_mut("FileOperation") else {
            return false;
        };

        let mut file_node = Element::new("characteristic");
        file_node.set_attr("type", display_name);
        file_node.set_attr("translation", "install");
        let mut extract = Element::new("characteristic");
        extract.set_attr("type", "Extract");
        let mut parm = Element::new("parm");
        parm.set_attr("name", "Source");
        parm.set_attr("value", source);
        extract.children.push(Node::Element(parm));
        file_node.children.push(Node::Element(extract));

        let parent = resolve_target_parent(fileop, directory);
        parent.children.push(Node::Element(file_node));
        self.update_numfiles();
        true
    }

    /// Removes the mapping with this source name (case-insensitive),
    /// returning whether one was found.
    pub fn remove(&mut self, source: &str) -> bool {
        let Some(fileop) = self.root.characteristic_mut("FileOperation") else {
            return false;
        };
        let removed = remove_entry(fileop, source);
        if removed {
            self.update_numfiles();
        }
        removed
    }

    /// Serializes the document as well-formed UTF-8 XML.
    pub fn to_xml(&self) -> Result<Vec<u8>, ManifestError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(|e| ManifestError::Xml(e.to_string()))?;
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner().into_inner())
    }

    /// Keeps the Install/NumFiles parm equal to the mapping count.
    fn update_numfiles(&mut self) {
        let count = self.entries().len();
        if let Some(install) = self.root.characteristic_mut("Install")
            && let Some(parm) = install.parm_mut("NumFiles")
        {
            parm.set_attr("value", &count.to_string());
        }
    }
}

/// Walks every descendant characteristic of the FileOperation section,
/// collecting file nodes (a characteristic whose direct Extract child carries
/// a Source parm).
fn collect_entries(parent: &Element, out: &mut Vec<ManifestEntry>) {
    for child in parent.child_elements() {
        if child.name != "characteristic" {
            continue;
        }
        if let Some(source) = extract_source(child) {
            out.push(ManifestEntry {
                name: child.attr("type").unwrap_or_default().to_string(),
                source: source.to_string(),
                directory: parent.attr("type").unwrap_or_default().to_string(),
            });
        } else {
            collect_entries(child, out);
        }
    }
}

/// Source parm value of a file node, or None if this is not a file node.
fn extract_source(node: &Element) -> Option<&str> {
    let extract = node.characteristic("Extract")?;
    extract
        .child_elements()
        .find(|e| e.name == "parm" && e.attr("name") == Some("Source"))
        .and_then(|p| p.attr("value"))
}

fn find_directory<'a>(parent: &'a Element, source: &str, dir: &'a str) -> Option<&'a str> {
    for child in parent.child_elements() {
        if child.name != "characteristic" {
            continue;
        }
        match extract_source(child) {
            Some(s) if s.eq_ignore_ascii_case(source) => {
                return Some(parent.attr("type").unwrap_or(dir));
            }
            Some(_) => {}
            None => {
                if let Some(found) = find_directory(child, source, dir) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn remove_entry(parent: &mut Element, source: &str) -> bool {
    // Try direct children first, then recurse into nested directories.
    let position = parent.children.iter().position(|n| match n {
        Node::Element(e) if e.name == "characteristic" => {
            extract_source(e).is_some_and(|s| s.eq_ignore_ascii_case(source))
        }
        _ => false,
    });
    if let Some(idx) = position {
        parent.children.remove(idx);
        return true;
    }

    for node in parent.children.iter_mut() {
        if let Node::Element(e) = node
            && e.name == "characteristic"
            && remove_entry(e, source)
        {
            return true;
        }
    }
    false
}

fn resolve_target_parent<'a>(fileop: &'a mut Element, directory: Option<&str>) -> &'a mut Element {
    let by_dir = directory.and_then(|d| {
        fileop
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.name == "characteristic" && e.attr("type") == Some(d)))
    });
    let fallback = fileop.children.iter().position(
        |n| matches!(n, Node::Element(e) if e.name == "characteristic" && e.attr("translation") == Some("install")),
    );

    match by_dir.or(fallback) {
        Some(idx) => match &mut fileop.children[idx] {
            Node::Element(e) => e,
            Node::Text(_) => unreachable!("position matched an element"),
        },
        None => fileop,
    }
}

/// Decodes manifest bytes, trying UTF-8, then UTF-16LE, then Latin-1.
fn decode_text(raw: &[u8]) -> String {
    if raw.len() >= 2 && raw[..2] == [0xFF, 0xFE] {
        return decode_utf16le(&raw[2..]);
    }
    if let Ok(s) = std::str::from_utf8(raw) {
        return s.trim_start_matches('\u{feff}').to_string();
    }
    // Heuristic: interleaved NULs mean UTF-16LE without a BOM.
    if raw.len() >= 4 && raw.iter().skip(1).step_by(2).take(8).all(|&b| b == 0) {
        return decode_utf16le(raw);
    }
    raw.iter().map(|&b| b as char).collect()
}

fn decode_utf16le(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn parse_tree(text: &str) -> Result<Element, ManifestError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let elem = element_from_start(e)?;
                stack.push(elem);
            }
            Ok(Event::Empty(ref e)) => {
                let elem = element_from_start(e)?;
                attach(&mut stack, &mut root, Node::Element(elem))?;
            }
            Ok(Event::End(_)) => {
                let elem = stack.pop().ok_or_else(|| {
                    ManifestError::Xml("unbalanced closing tag".to_string())
                })?;
                attach(&mut stack, &mut root, Node::Element(elem))?;
            }
            Ok(Event::Text(ref t)) => {
                let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                if !text.trim().is_empty() {
                    attach(&mut stack, &mut root, Node::Text(text))?;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ManifestError::Xml(e.to_string())),
        }
    }

    if !stack.is_empty() {
        return Err(ManifestError::Xml("unclosed element".to_string()));
    }
    root.ok_or(ManifestError::NoRoot)
}

fn element_from_start(e: &BytesStart<'_>) -> Result<Element, ManifestError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut elem = Element::new(&name);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ManifestError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ManifestError::Xml(e.to_string()))?
            .into_owned();
        elem.attrs.push((key, value));
    }
    Ok(elem)
}

fn attach(
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
    node: Node,
) -> Result<(), ManifestError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        }
        None => match node {
            Node::Element(e) if root.is_none() => {
                *root = Some(e);
                Ok(())
            }
            Node::Element(_) => Err(ManifestError::Xml("multiple root elements".to_string())),
            Node::Text(_) => Ok(()),
        },
    }
}

fn write_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    elem: &Element,
) -> Result<(), ManifestError> {
    let mut start = BytesStart::new(elem.name.as_str());
    for (k, v) in &elem.attrs {
        start.push_attribute((k.as_str(), v.as_str()));
    }

    if elem.children.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(|e| ManifestError::Xml(e.to_string()))?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| ManifestError::Xml(e.to_string()))?;
    for child in &elem.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(|e| ManifestError::Xml(e.to_string()))?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(elem.name.as_str())))
        .map_err(|e| ManifestError::Xml(e.to_string()))
}
