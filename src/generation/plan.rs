//! Typed plan for one generation unit: which templates it compiles, which
//! row types it fetches, and how rows are grouped. Iteration order is always
//! first-insertion order.

use crate::error::GenerationError;
use crate::generation::options::UnitOptions;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Set that keeps first-insertion order and drops repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedSet<T> {
    items: Vec<T>,
}

impl<T: PartialEq> OrderedSet<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Returns whether `item` was newly added.
    pub fn insert(&mut self, item: T) -> bool {
        if self.items.contains(&item) {
            false
        } else {
            self.items.push(item);
            true
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: PartialEq> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a OrderedSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Kind of store row a template iterates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RowType {
    Cluster,
    Attribute,
    Command,
    DeviceType,
    Atomic,
    EndpointType,
    EndpointTypeCluster,
    EndpointTypeAttribute,
    EndpointTypeCommand,
    Endpoint,
    KeyValue,
}

impl RowType {
    pub const ALL: [RowType; 11] = [
        RowType::Cluster,
        RowType::Attribute,
        RowType::Command,
        RowType::DeviceType,
        RowType::Atomic,
        RowType::EndpointType,
        RowType::EndpointTypeCluster,
        RowType::EndpointTypeAttribute,
        RowType::EndpointTypeCommand,
        RowType::Endpoint,
        RowType::KeyValue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RowType::Cluster => "cluster",
            RowType::Attribute => "attribute",
            RowType::Command => "command",
            RowType::DeviceType => "deviceType",
            RowType::Atomic => "atomic",
            RowType::EndpointType => "endpointType",
            RowType::EndpointTypeCluster => "endpointTypeCluster",
            RowType::EndpointTypeAttribute => "endpointTypeAttribute",
            RowType::EndpointTypeCommand => "endpointTypeCommand",
            RowType::Endpoint => "endpoint",
            RowType::KeyValue => "keyValue",
        }
    }
}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RowType {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RowType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GenerationError::UnknownRowType(s.to_string()))
    }
}

/// Template identifier as written in the options descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateId(pub String);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One template render: its row type and target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderStep {
    pub template: TemplateId,
    pub row_type: RowType,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    pub row_type: RowType,
    pub group_key: String,
}

/// Validated plan for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPlan {
    pub filename: String,
    pub helper_api: String,
    pub templates: OrderedSet<TemplateId>,
    pub row_types: OrderedSet<RowType>,
    pub groupings: Vec<Grouping>,
    pub steps: Vec<RenderStep>,
}

impl UnitPlan {
    pub fn from_options(unit: &UnitOptions) -> Result<Self, GenerationError> {
        let mut templates = OrderedSet::new();
        let mut row_types = OrderedSet::new();
        let mut steps = Vec::with_capacity(unit.templates.len());
        for row in &unit.templates {
            let template = TemplateId(row.template_file.clone());
            let row_type: RowType = row.db_row_type.parse()?;
            templates.insert(template.clone());
            row_types.insert(row_type);
            steps.push(RenderStep {
                template,
                row_type,
                output: row.filename.clone().unwrap_or_else(|| unit.filename.clone()),
            });
        }

        let mut groupings = Vec::with_capacity(unit.group_info.len());
        for group in &unit.group_info {
            let row_type: RowType = group.db_type.parse()?;
            row_types.insert(row_type);
            if groupings.iter().any(|g: &Grouping| g.row_type == row_type) {
                continue;
            }
            groupings.push(Grouping {
                row_type,
                group_key: group.group_key.clone(),
            });
        }

        Ok(Self {
            filename: unit.filename.clone(),
            helper_api: unit.helper_api_name.clone(),
            templates,
            row_types,
            groupings,
            steps,
        })
    }

    /// Output files in first-use order.
    pub fn outputs(&self) -> OrderedSet<String> {
        let mut outputs = OrderedSet::new();
        for step in &self.steps {
            outputs.insert(step.output.clone());
        }
        outputs
    }
}
