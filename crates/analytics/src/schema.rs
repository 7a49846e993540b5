//! Response schema derived from the registry
//!
//! The schema is generated, never maintained by hand: adding a metric to the
//! registry adds it here.

use schemars::Map;
use schemars::schema::{
    InstanceType, Metadata, ObjectValidation, RootSchema, Schema, SchemaObject, SingleOrVec,
};

use crate::registry::MetricRegistry;

const META_SCHEMA: &str = "http://json-schema.org/draft-07/schema#";

/// Schema of the single-row balance-sheet response
pub fn response_schema(registry: &MetricRegistry) -> RootSchema {
    let properties = metric_properties(registry);
    root(
        "BalanceSheet",
        "Current period, same period last year and percent change per metric",
        properties,
    )
}

/// Schema of one grouped balance-sheet row
pub fn grouped_row_schema(registry: &MetricRegistry) -> RootSchema {
    let mut properties = Map::new();
    properties.insert("id".to_string(), typed(InstanceType::String, "Group key"));
    properties.insert(
        "name".to_string(),
        typed(InstanceType::String, "Group display name"),
    );
    properties.extend(metric_properties(registry));
    properties.insert(
        "_total_count".to_string(),
        typed(InstanceType::Integer, "Groups matching the request"),
    );
    root(
        "BalanceSheetRow",
        "Balance-sheet metrics for one group",
        properties,
    )
}

fn metric_properties(registry: &MetricRegistry) -> Map<String, Schema> {
    let mut properties = Map::new();
    for metric in registry.base_metrics() {
        let current = format!(
            "{} of {}.{}",
            metric.aggregation.name(),
            metric.table,
            metric.field
        );
        let last_year = format!("{} for the same period last year", metric.alias);
        let change = format!("{} change vs last year, percent", metric.alias);

        properties.insert(metric.alias.clone(), typed(InstanceType::Number, &current));
        properties.insert(metric.last_year_field(), typed(InstanceType::Number, &last_year));
        properties.insert(metric.vs_last_year_field(), typed(InstanceType::Number, &change));
    }
    for metric in registry.calculated_metrics() {
        let derived = format!("Derived from {}", metric.dependencies.join(", "));
        properties.insert(metric.name.clone(), typed(InstanceType::Number, &derived));
    }
    properties
}

fn typed(instance_type: InstanceType, description: &str) -> Schema {
    Schema::Object(SchemaObject {
        metadata: Some(Box::new(Metadata {
            description: Some(description.to_string()),
            ..Default::default()
        })),
        instance_type: Some(SingleOrVec::Single(Box::new(instance_type))),
        ..Default::default()
    })
}

fn root(title: &str, description: &str, properties: Map<String, Schema>) -> RootSchema {
    let required = properties.keys().cloned().collect();
    RootSchema {
        meta_schema: Some(META_SCHEMA.to_string()),
        schema: SchemaObject {
            metadata: Some(Box::new(Metadata {
                title: Some(title.to_string()),
                description: Some(description.to_string()),
                ..Default::default()
            })),
            instance_type: Some(SingleOrVec::Single(Box::new(InstanceType::Object))),
            object: Some(Box::new(ObjectValidation {
                properties,
                required,
                additional_properties: Some(Box::new(Schema::Bool(false))),
                ..Default::default()
            })),
            ..Default::default()
        },
        definitions: Map::new(),
    }
}
