//! Custom element / custom attribute definitions, the registry that resolves
//! them by name, and the per-definition info cache used while binding.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::case::kebab_case;
use crate::error::{Result, TemplateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingMode {
    #[default]
    Default,
    OneTime,
    ToView,
    FromView,
    TwoWay,
}

impl BindingMode {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "default" => BindingMode::Default,
            "one-time" | "oneTime" => BindingMode::OneTime,
            "to-view" | "toView" => BindingMode::ToView,
            "from-view" | "fromView" => BindingMode::FromView,
            "two-way" | "twoWay" => BindingMode::TwoWay,
            _ => return None,
        })
    }

    pub fn or(self, fallback: BindingMode) -> BindingMode {
        match self {
            BindingMode::Default => fallback,
            other => other,
        }
    }
}

/// A declared bindable property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindableDefinition {
    pub property: String,
    /// Attribute name used in markup, kebab-cased property by default.
    pub attribute: String,
    pub mode: BindingMode,
    pub primary: bool,
}

impl BindableDefinition {
    pub fn new(property: &str) -> Self {
        Self {
            property: property.to_string(),
            attribute: kebab_case(property),
            mode: BindingMode::Default,
            primary: false,
        }
    }

    pub fn attribute(mut self, attribute: &str) -> Self {
        self.attribute = attribute.to_string();
        self
    }

    pub fn mode(mut self, mode: BindingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowMode {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowOptions {
    pub mode: ShadowMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomElementDefinition {
    pub name: String,
    pub aliases: Vec<String>,
    /// Markup; `None` for elements without a view.
    pub template: Option<String>,
    /// Keyed by property name.
    pub bindables: IndexMap<String, BindableDefinition>,
    pub containerless: bool,
    pub capture: bool,
    pub shadow_options: Option<ShadowOptions>,
    /// Resources visible only inside this element's template.
    pub dependencies: Vec<ResourceDefinition>,
}

impl CustomElementDefinition {
    pub fn builder(name: &str) -> CustomElementBuilder {
        CustomElementBuilder {
            def: CustomElementDefinition {
                name: name.to_string(),
                aliases: Vec::new(),
                template: None,
                bindables: IndexMap::new(),
                containerless: false,
                capture: false,
                shadow_options: None,
                dependencies: Vec::new(),
            },
        }
    }
}

pub struct CustomElementBuilder {
    def: CustomElementDefinition,
}

impl CustomElementBuilder {
    pub fn template(mut self, markup: &str) -> Self {
        self.def.template = Some(markup.to_string());
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.def.aliases.push(alias.to_string());
        self
    }

    pub fn bindable(mut self, bindable: BindableDefinition) -> Self {
        self.def.bindables.insert(bindable.property.clone(), bindable);
        self
    }

    /// Shorthand for several default-mode bindables.
    pub fn bindables(mut self, properties: &[&str]) -> Self {
        for p in properties {
            self = self.bindable(BindableDefinition::new(p));
        }
        self
    }

    pub fn containerless(mut self) -> Self {
        self.def.containerless = true;
        self
    }

    pub fn capture(mut self) -> Self {
        self.def.capture = true;
        self
    }

    pub fn shadow(mut self, mode: ShadowMode) -> Self {
        self.def.shadow_options = Some(ShadowOptions { mode });
        self
    }

    pub fn dependency(mut self, dep: impl Into<ResourceDefinition>) -> Self {
        self.def.dependencies.push(dep.into());
        self
    }

    pub fn build(self) -> Arc<CustomElementDefinition> {
        Arc::new(self.def)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAttributeDefinition {
    pub name: String,
    pub aliases: Vec<String>,
    pub bindables: IndexMap<String, BindableDefinition>,
    pub is_template_controller: bool,
    pub default_binding_mode: BindingMode,
    pub no_multi_bindings: bool,
}

impl CustomAttributeDefinition {
    pub fn builder(name: &str) -> CustomAttributeBuilder {
        CustomAttributeBuilder {
            def: CustomAttributeDefinition {
                name: name.to_string(),
                aliases: Vec::new(),
                bindables: IndexMap::new(),
                is_template_controller: false,
                default_binding_mode: BindingMode::ToView,
                no_multi_bindings: false,
            },
        }
    }
}

pub struct CustomAttributeBuilder {
    def: CustomAttributeDefinition,
}

impl CustomAttributeBuilder {
    pub fn alias(mut self, alias: &str) -> Self {
        self.def.aliases.push(alias.to_string());
        self
    }

    pub fn bindable(mut self, bindable: BindableDefinition) -> Self {
        self.def.bindables.insert(bindable.property.clone(), bindable);
        self
    }

    pub fn bindables(mut self, properties: &[&str]) -> Self {
        for p in properties {
            self = self.bindable(BindableDefinition::new(p));
        }
        self
    }

    pub fn template_controller(mut self) -> Self {
        self.def.is_template_controller = true;
        self
    }

    pub fn default_binding_mode(mut self, mode: BindingMode) -> Self {
        self.def.default_binding_mode = mode;
        self
    }

    pub fn no_multi_bindings(mut self) -> Self {
        self.def.no_multi_bindings = true;
        self
    }

    pub fn build(self) -> Arc<CustomAttributeDefinition> {
        Arc::new(self.def)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResourceDefinition {
    Element(Arc<CustomElementDefinition>),
    Attribute(Arc<CustomAttributeDefinition>),
}

impl ResourceDefinition {
    pub fn name(&self) -> &str {
        match self {
            ResourceDefinition::Element(d) => &d.name,
            ResourceDefinition::Attribute(d) => &d.name,
        }
    }
}

impl From<Arc<CustomElementDefinition>> for ResourceDefinition {
    fn from(d: Arc<CustomElementDefinition>) -> Self {
        ResourceDefinition::Element(d)
    }
}

impl From<Arc<CustomAttributeDefinition>> for ResourceDefinition {
    fn from(d: Arc<CustomAttributeDefinition>) -> Self {
        ResourceDefinition::Attribute(d)
    }
}

/// Read side of resource registration, all the binder and compiler need.
pub trait ResourceResolver {
    fn find_element(&self, name: &str) -> Option<Arc<CustomElementDefinition>>;
    fn find_attribute(&self, name: &str) -> Option<Arc<CustomAttributeDefinition>>;
}

/// Name (and alias) keyed resource table.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    elements: FxHashMap<String, Arc<CustomElementDefinition>>,
    attributes: FxHashMap<String, Arc<CustomAttributeDefinition>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: impl Into<ResourceDefinition>) {
        match def.into() {
            ResourceDefinition::Element(d) => {
                for alias in &d.aliases {
                    self.elements.insert(alias.clone(), d.clone());
                }
                self.elements.insert(d.name.clone(), d);
            }
            ResourceDefinition::Attribute(d) => {
                for alias in &d.aliases {
                    self.attributes.insert(alias.clone(), d.clone());
                }
                self.attributes.insert(d.name.clone(), d);
            }
        }
    }

    pub fn has_element(&self, name: &str) -> bool {
        self.elements.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.elements.len() + self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceResolver for ResourceRegistry {
    fn find_element(&self, name: &str) -> Option<Arc<CustomElementDefinition>> {
        self.elements.get(name).cloned()
    }

    fn find_attribute(&self, name: &str) -> Option<Arc<CustomAttributeDefinition>> {
        self.attributes.get(name).cloned()
    }
}

/// A local registry consulted before its parent resolver.
pub struct ScopedResolver<'a> {
    pub local: &'a ResourceRegistry,
    pub parent: &'a dyn ResourceResolver,
}

impl ResourceResolver for ScopedResolver<'_> {
    fn find_element(&self, name: &str) -> Option<Arc<CustomElementDefinition>> {
        self.local.find_element(name).or_else(|| self.parent.find_element(name))
    }

    fn find_attribute(&self, name: &str) -> Option<Arc<CustomAttributeDefinition>> {
        self.local.find_attribute(name).or_else(|| self.parent.find_attribute(name))
    }
}

/// Resolved bindable: the view-model property and the effective mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindableInfo {
    pub prop_name: String,
    pub mode: BindingMode,
}

impl BindableInfo {
    pub fn new(prop_name: &str, mode: BindingMode) -> Self {
        Self {
            prop_name: prop_name.to_string(),
            mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementInfo {
    pub name: String,
    /// Set when the element was referenced by an alias.
    pub alias: Option<String>,
    pub containerless: bool,
    pub capture: bool,
    /// Keyed by attribute name.
    pub bindables: IndexMap<String, BindableInfo>,
}

impl ElementInfo {
    pub fn from_definition(def: &CustomElementDefinition, alias: &str) -> Self {
        let bindables = def
            .bindables
            .values()
            .map(|b| (b.attribute.clone(), BindableInfo::new(&b.property, b.mode.or(BindingMode::ToView))))
            .collect();
        Self {
            name: def.name.clone(),
            alias: (alias != def.name).then(|| alias.to_string()),
            containerless: def.containerless,
            capture: def.capture,
            bindables,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrInfo {
    pub name: String,
    pub alias: Option<String>,
    pub is_template_controller: bool,
    pub no_multi_bindings: bool,
    /// Keyed by attribute name.
    pub bindables: IndexMap<String, BindableInfo>,
    /// Target of single-value usage.
    pub primary: BindableInfo,
}

impl AttrInfo {
    /// Resolve bindables and pick the primary one: the declared primary, else
    /// the first bindable, else a synthetic `value`.
    pub fn from_definition(def: &CustomAttributeDefinition, alias: &str) -> Result<Self> {
        let default_mode = def.default_binding_mode.or(BindingMode::ToView);
        let mut bindables = IndexMap::new();
        let mut primary: Option<(String, BindableInfo)> = None;
        let mut first: Option<BindableInfo> = None;

        for b in def.bindables.values() {
            let info = BindableInfo::new(&b.property, b.mode.or(default_mode));
            if b.primary {
                if let Some((existing, _)) = &primary {
                    return Err(TemplateError::DuplicatePrimaryBindable {
                        resource: def.name.clone(),
                        first: existing.clone(),
                        second: b.property.clone(),
                    });
                }
                primary = Some((b.property.clone(), info.clone()));
            }
            if first.is_none() {
                first = Some(info.clone());
            }
            bindables.insert(b.attribute.clone(), info);
        }

        let primary = match (primary, first) {
            (Some((_, p)), _) => p,
            (None, Some(f)) => f,
            (None, None) => {
                let value = BindableInfo::new("value", default_mode);
                bindables.insert("value".to_string(), value.clone());
                value
            }
        };

        Ok(Self {
            name: def.name.clone(),
            alias: (alias != def.name).then(|| alias.to_string()),
            is_template_controller: def.is_template_controller,
            no_multi_bindings: def.no_multi_bindings,
            bindables,
            primary,
        })
    }
}

type CacheKey = (usize, String);

/// Element/attribute infos memoized by `(definition identity, alias)`.
///
/// Entries hold on to their definition so the identity stays valid for the
/// life of the cache.
#[derive(Default)]
pub struct ResourceInfoCache {
    elements: RefCell<FxHashMap<CacheKey, (Arc<CustomElementDefinition>, Rc<ElementInfo>)>>,
    attributes: RefCell<FxHashMap<CacheKey, (Arc<CustomAttributeDefinition>, Rc<AttrInfo>)>>,
}

impl ResourceInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, def: &Arc<CustomElementDefinition>, alias: &str) -> Rc<ElementInfo> {
        let key = (Arc::as_ptr(def) as usize, alias.to_string());
        if let Some((_, info)) = self.elements.borrow().get(&key) {
            return info.clone();
        }
        let info = Rc::new(ElementInfo::from_definition(def, alias));
        self.elements.borrow_mut().insert(key, (def.clone(), info.clone()));
        info
    }

    pub fn attribute(&self, def: &Arc<CustomAttributeDefinition>, alias: &str) -> Result<Rc<AttrInfo>> {
        let key = (Arc::as_ptr(def) as usize, alias.to_string());
        if let Some((_, info)) = self.attributes.borrow().get(&key) {
            return Ok(info.clone());
        }
        let info = Rc::new(AttrInfo::from_definition(def, alias)?);
        self.attributes.borrow_mut().insert(key, (def.clone(), info.clone()));
        Ok(info)
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len() + self.attributes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_bindables_default_to_to_view() {
        let def = CustomElementDefinition::builder("el")
            .bindable(BindableDefinition::new("fooBar"))
            .bindable(BindableDefinition::new("baz").mode(BindingMode::TwoWay))
            .build();
        let info = ElementInfo::from_definition(&def, "el");
        assert_eq!(info.bindables["foo-bar"], BindableInfo::new("fooBar", BindingMode::ToView));
        assert_eq!(info.bindables["baz"].mode, BindingMode::TwoWay);
        assert_eq!(info.alias, None);
    }

    #[test]
    fn attribute_primary_resolution() {
        let none = CustomAttributeDefinition::builder("a").build();
        assert_eq!(AttrInfo::from_definition(&none, "a").unwrap().primary.prop_name, "value");

        let first = CustomAttributeDefinition::builder("a").bindables(&["x", "y"]).build();
        assert_eq!(AttrInfo::from_definition(&first, "a").unwrap().primary.prop_name, "x");

        let explicit = CustomAttributeDefinition::builder("a")
            .bindable(BindableDefinition::new("x"))
            .bindable(BindableDefinition::new("y").primary())
            .default_binding_mode(BindingMode::TwoWay)
            .build();
        let info = AttrInfo::from_definition(&explicit, "b").unwrap();
        assert_eq!(info.primary, BindableInfo::new("y", BindingMode::TwoWay));
        assert_eq!(info.alias.as_deref(), Some("b"));
    }

    #[test]
    fn two_primaries_is_an_error() {
        let def = CustomAttributeDefinition::builder("a")
            .bindable(BindableDefinition::new("x").primary())
            .bindable(BindableDefinition::new("y").primary())
            .build();
        assert!(matches!(
            AttrInfo::from_definition(&def, "a"),
            Err(TemplateError::DuplicatePrimaryBindable { .. })
        ));
    }

    #[test]
    fn cache_is_keyed_by_identity_and_alias() {
        let cache = ResourceInfoCache::new();
        let def = CustomElementDefinition::builder("el").alias("other").build();
        let a = cache.element(&def, "el");
        let b = cache.element(&def, "el");
        let c = cache.element(&def, "other");
        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }
}
