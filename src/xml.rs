use anyhow::Context;
use quick_xml::NsReader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;

/// Parsed XML response, navigable by local-name paths.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    namespace: Option<String>,
    local_name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Document {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut reader = NsReader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let (namespace, event) = reader.read_resolved_event()?;
            let namespace = namespace_uri(namespace)?;

            match event {
                Event::Start(e) => {
                    stack.push(Element::from_start(&reader, namespace, &e)?);
                }
                Event::Empty(e) => {
                    let element = Element::from_start(&reader, namespace, &e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| anyhow::anyhow!("unexpected closing tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.push_text(&reader.decoder().decode(&e)?);
                    }
                }
                Event::CData(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.push_text(&reader.decoder().decode(&e)?);
                    }
                }
                Event::GeneralRef(e) => {
                    let Some(parent) = stack.last_mut() else {
                        continue;
                    };
                    if let Some(ch) = e.resolve_char_ref()? {
                        parent.push_text(ch.encode_utf8(&mut [0u8; 4]));
                    } else {
                        let name = reader.decoder().decode(&e)?;
                        let value = resolve_predefined_entity(&name)
                            .ok_or_else(|| anyhow::anyhow!("unknown entity &{};", name))?;
                        parent.push_text(value);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            anyhow::bail!("unclosed element <{}>", open.local_name);
        }

        let root = root.context("document has no root element")?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// See [`Element::select`].
    pub fn select(&self, path: &str) -> Vec<&Element> {
        self.root.select(path)
    }

    pub fn first(&self, path: &str) -> Option<&Element> {
        self.select(path).into_iter().next()
    }
}

impl Element {
    fn from_start(
        reader: &NsReader<&[u8]>,
        namespace: Option<String>,
        start: &BytesStart<'_>,
    ) -> anyhow::Result<Self> {
        let local_name = std::str::from_utf8(start.local_name().as_ref())?.to_string();

        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = std::str::from_utf8(attribute.key.as_ref())?;
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            let key = std::str::from_utf8(attribute.key.local_name().as_ref())?.to_string();
            let value = attribute
                .decode_and_unescape_value(reader.decoder())?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            namespace,
            local_name,
            attributes,
            children: Vec::new(),
        })
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// `{namespace}local` when the element is in a namespace, `local` otherwise.
    pub fn universal_name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{{{}}}{}", namespace, self.local_name),
            None => self.local_name.clone(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// All elements below this one, in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children().rev().collect(),
        }
    }

    pub fn descendants_or_self(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Concatenated text of every descendant text node.
    pub fn full_text(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    /// Evaluates a slash separated path of local names.
    ///
    /// A leading `//` matches the first step anywhere at or below this
    /// element; every other step matches direct children only.
    pub fn select(&self, path: &str) -> Vec<&Element> {
        let (anywhere, path) = match path.strip_prefix("//") {
            Some(rest) => (true, rest),
            None => (false, path),
        };
        let mut steps = path.split('/').filter(|step| !step.is_empty());

        let mut current: Vec<&Element> = if anywhere {
            match steps.next() {
                Some(first) => self
                    .descendants_or_self()
                    .filter(|element| element.local_name == first)
                    .collect(),
                None => return Vec::new(),
            }
        } else {
            vec![self]
        };

        for step in steps {
            current = current
                .into_iter()
                .flat_map(|element| element.children())
                .filter(|child| child.local_name == step)
                .collect();
        }

        current
    }

    fn push_element(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }

    fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) => element.collect_text(out),
            }
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children().rev());
        Some(element)
    }
}

fn namespace_uri(resolved: ResolveResult<'_>) -> anyhow::Result<Option<String>> {
    match resolved {
        ResolveResult::Bound(namespace) => {
            Ok(Some(std::str::from_utf8(namespace.0)?.to_string()))
        }
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => anyhow::bail!(
            "unknown namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ),
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> anyhow::Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.push_element(element);
    } else if root.is_some() {
        anyhow::bail!("document has more than one root element");
    } else {
        *root = Some(element);
    }
    Ok(())
}
