//! Prim specs and their properties.
//!
//! A [`Prim`] is one node opinion inside a layer: a specifier, an optional
//! schema type, applied API schemas, metadata, composition arcs, properties
//! and child prims.

use super::{MetaData, PrimPath, PropertyPath, Value};

/// How a prim spec contributes to composition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Specifier {
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }
}

/// Reference or payload arc: an asset path plus an optional target prim.
/// An empty asset path targets the same layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    pub asset: String,
    pub prim: Option<PrimPath>,
}

impl Reference {
    pub fn new(asset: impl Into<String>, prim: Option<PrimPath>) -> Self {
        Self { asset: asset.into(), prim }
    }
}

/// Typed attribute with an optional default value.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub type_name: String,
    pub value: Option<Value>,
    pub uniform: bool,
    pub custom: bool,
    pub connections: Vec<PropertyPath>,
    pub metadata: MetaData,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            type_name: value.type_name().to_string(),
            value: Some(value),
            uniform: false,
            custom: false,
            connections: Vec::new(),
            metadata: MetaData::new(),
        }
    }

    /// Declared attribute without a value, e.g. a shader output.
    pub fn declared(name: impl Into<String>, type_name: &str) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.to_string(),
            value: None,
            uniform: false,
            custom: false,
            connections: Vec::new(),
            metadata: MetaData::new(),
        }
    }

    pub fn uniform(mut self) -> Self {
        self.uniform = true;
        self
    }

    pub fn custom(mut self) -> Self {
        self.custom = true;
        self
    }

    pub fn with_interpolation(mut self, interpolation: &str) -> Self {
        self.metadata.set(MetaData::INTERPOLATION, interpolation);
        self
    }

    pub fn connected_to(mut self, source: PropertyPath) -> Self {
        self.connections.push(source);
        self
    }
}

/// Relationship with ordered targets.
#[derive(Clone, Debug, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub targets: Vec<PrimPath>,
    pub custom: bool,
}

impl Relationship {
    pub fn new(name: impl Into<String>, targets: Vec<PrimPath>) -> Self {
        Self { name: name.into(), targets, custom: false }
    }
}

/// Property on a prim.
#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    Attribute(Attribute),
    Relationship(Relationship),
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::Attribute(a) => &a.name,
            Property::Relationship(r) => &r.name,
        }
    }

    /// First namespace segment, e.g. `physics` for `physics:mass`.
    pub fn namespace(&self) -> Option<&str> {
        let name = self.name();
        name.find(':').map(|i| &name[..i])
    }
}

/// Prim spec.
#[derive(Clone, Debug, PartialEq)]
pub struct Prim {
    pub name: String,
    pub specifier: Specifier,
    pub type_name: Option<String>,
    pub api_schemas: Vec<String>,
    pub metadata: MetaData,
    pub asset_info: MetaData,
    pub references: Vec<Reference>,
    pub payloads: Vec<Reference>,
    pub properties: Vec<Property>,
    pub children: Vec<Prim>,
}

impl Prim {
    pub fn new(specifier: Specifier, name: impl Into<String>, type_name: Option<&str>) -> Self {
        Self {
            name: name.into(),
            specifier,
            type_name: type_name.map(str::to_string),
            api_schemas: Vec::new(),
            metadata: MetaData::new(),
            asset_info: MetaData::new(),
            references: Vec::new(),
            payloads: Vec::new(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// `def <type> "name"`.
    pub fn def(name: impl Into<String>, type_name: &str) -> Self {
        let ty = if type_name.is_empty() { None } else { Some(type_name) };
        Self::new(Specifier::Def, name, ty)
    }

    /// `over "name"`.
    pub fn over(name: impl Into<String>) -> Self {
        Self::new(Specifier::Over, name, None)
    }

    /// `class <type> "name"`.
    pub fn class(name: impl Into<String>, type_name: &str) -> Self {
        Self::new(Specifier::Class, name, Some(type_name))
    }

    /// True for `def` and `class` specs.
    pub fn is_defining(&self) -> bool {
        self.specifier != Specifier::Over
    }

    // === Children ===

    pub fn child(&self, name: &str) -> Option<&Prim> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Prim> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    fn child_index_or_insert(&mut self, name: &str, make: impl FnOnce() -> Prim) -> usize {
        match self.children.iter().position(|c| c.name == name) {
            Some(i) => i,
            None => {
                self.children.push(make());
                self.children.len() - 1
            }
        }
    }

    /// Get or create a child `def`. An existing `over` is promoted.
    pub fn define_child(&mut self, name: &str, type_name: &str) -> &mut Prim {
        let i = self.child_index_or_insert(name, || Prim::def(name, type_name));
        let child = &mut self.children[i];
        if child.specifier == Specifier::Over {
            child.specifier = Specifier::Def;
        }
        if !type_name.is_empty() {
            child.type_name = Some(type_name.to_string());
        }
        child
    }

    /// Get or create a child `over`.
    pub fn override_child(&mut self, name: &str) -> &mut Prim {
        let i = self.child_index_or_insert(name, || Prim::over(name));
        &mut self.children[i]
    }

    // === Schemas and metadata ===

    pub fn apply_api(&mut self, schema: &str) {
        if !self.has_api(schema) {
            self.api_schemas.push(schema.to_string());
        }
    }

    pub fn has_api(&self, schema: &str) -> bool {
        self.api_schemas.iter().any(|s| s == schema)
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.set(key, value);
    }

    pub fn set_display_name(&mut self, name: &str) {
        self.metadata.set(MetaData::DISPLAY_NAME, Value::string(name));
    }

    /// Author an empty `displayName` so weaker opinions, such as a referenced
    /// library prim, do not show through.
    pub fn block_display_name(&mut self) {
        self.metadata.set(MetaData::DISPLAY_NAME, Value::string(""));
    }

    /// The display name, or `None` when unset or blocked.
    pub fn display_name(&self) -> Option<&str> {
        self.metadata.get_str(MetaData::DISPLAY_NAME).filter(|name| !name.is_empty())
    }

    pub fn set_kind(&mut self, kind: &str) {
        self.metadata.set(MetaData::KIND, kind);
    }

    pub fn kind(&self) -> Option<&str> {
        self.metadata.get_str(MetaData::KIND)
    }

    pub fn add_reference(&mut self, reference: Reference) {
        if !self.references.contains(&reference) {
            self.references.push(reference);
        }
    }

    pub fn add_payload(&mut self, payload: Reference) {
        if !self.payloads.contains(&payload) {
            self.payloads.push(payload);
        }
    }

    // === Properties ===

    fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name() == name)
    }

    /// Insert or replace an attribute spec.
    pub fn put_attribute(&mut self, attr: Attribute) -> &mut Attribute {
        let i = match self.property_index(&attr.name) {
            Some(i) => {
                self.properties[i] = Property::Attribute(attr);
                i
            }
            None => {
                self.properties.push(Property::Attribute(attr));
                self.properties.len() - 1
            }
        };
        match &mut self.properties[i] {
            Property::Attribute(a) => a,
            Property::Relationship(_) => unreachable!("slot was just written as an attribute"),
        }
    }

    /// Set an attribute value, keeping existing attribute metadata.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> &mut Attribute {
        let value = value.into();
        match self.property_index(name) {
            Some(i) if matches!(self.properties[i], Property::Attribute(_)) => {
                let Property::Attribute(a) = &mut self.properties[i] else {
                    unreachable!("matched as an attribute")
                };
                a.type_name = value.type_name().to_string();
                a.value = Some(value);
                a
            }
            _ => self.put_attribute(Attribute::new(name, value)),
        }
    }

    /// Set a `uniform` attribute value.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<Value>) -> &mut Attribute {
        let attr = self.set_attribute(name, value);
        attr.uniform = true;
        attr
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.properties.iter().find_map(|p| match p {
            Property::Attribute(a) if a.name == name => Some(a),
            _ => None,
        })
    }

    /// Authored value of an attribute.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.attribute(name).and_then(|a| a.value.as_ref())
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.properties.iter().find_map(|p| match p {
            Property::Relationship(r) if r.name == name => Some(r),
            _ => None,
        })
    }

    /// Replace a relationship's targets.
    pub fn set_relationship(&mut self, name: &str, targets: Vec<PrimPath>) -> &mut Relationship {
        let rel = Relationship::new(name, targets);
        let i = match self.property_index(name) {
            Some(i) => {
                self.properties[i] = Property::Relationship(rel);
                i
            }
            None => {
                self.properties.push(Property::Relationship(rel));
                self.properties.len() - 1
            }
        };
        match &mut self.properties[i] {
            Property::Relationship(r) => r,
            Property::Attribute(_) => unreachable!("slot was just written as a relationship"),
        }
    }

    /// Append a target, creating the relationship if needed.
    pub fn add_target(&mut self, name: &str, target: PrimPath) {
        let has_rel = self.relationship(name).is_some();
        if !has_rel {
            self.set_relationship(name, Vec::new());
        }
        for p in &mut self.properties {
            if let Property::Relationship(r) = p {
                if r.name == name && !r.targets.contains(&target) {
                    r.targets.push(target);
                    return;
                }
            }
        }
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property_index(name).is_some()
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(Property::name)
    }

    /// Depth-first walk of this prim and its descendants.
    pub fn walk<'a>(&'a self, path: &PrimPath, visit: &mut dyn FnMut(&PrimPath, &'a Prim)) {
        visit(path, self);
        for child in &self.children {
            child.walk(&path.child(&child.name), visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_promotes_over() {
        let mut root = Prim::def("robot", "Xform");
        root.override_child("Geometry");
        let geo = root.define_child("Geometry", "Scope");
        assert_eq!(geo.specifier, Specifier::Def);
        assert_eq!(geo.type_name.as_deref(), Some("Scope"));
        assert_eq!(root.children.len(), 1);
    }

    #[test]
    fn test_attribute_replace_keeps_order() {
        let mut prim = Prim::def("box", "Cube");
        prim.set_attribute("size", 2.0);
        prim.set_attribute("purpose", "guide");
        prim.set_attribute("size", 1.0);
        let names: Vec<&str> = prim.property_names().collect();
        assert_eq!(names, vec!["size", "purpose"]);
        assert_eq!(prim.value("size"), Some(&Value::Double(1.0)));
    }

    #[test]
    fn test_relationship_targets_unique() {
        let mut prim = Prim::over("body");
        prim.add_target("physics:filteredPairs", PrimPath::new("/a"));
        prim.add_target("physics:filteredPairs", PrimPath::new("/a"));
        prim.add_target("physics:filteredPairs", PrimPath::new("/b"));
        let rel = prim.relationship("physics:filteredPairs").unwrap();
        assert_eq!(rel.targets.len(), 2);
        assert_eq!(prim.properties[0].namespace(), Some("physics"));
    }
}
