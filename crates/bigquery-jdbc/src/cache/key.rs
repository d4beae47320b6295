// SPDX-License-Identifier: Apache-2.0

//! Cache key construction: `"<operation>:<dataset>:<name>"`

pub const TABLES: &str = "tables";
pub const COLUMNS: &str = "columns";
pub const SCHEMAS: &str = "schemas";

/// Key for a table listing under `dataset` matching `table_pattern`
pub fn tables(dataset: &str, table_pattern: &str) -> String {
    format!("{}:{}:{}", TABLES, dataset, table_pattern)
}

/// Key for a column listing of `table` in `dataset`
pub fn columns(dataset: &str, table: &str) -> String {
    format!("{}:{}:{}", COLUMNS, dataset, table)
}

/// Key for a dataset listing of `project` matching `dataset_pattern`
pub fn schemas(project: &str, dataset_pattern: &str) -> String {
    format!("{}:{}:{}", SCHEMAS, project, dataset_pattern)
}

/// Prefix covering every `operation` entry beneath `dataset`
pub fn prefix(operation: &str, dataset: &str) -> String {
    format!("{}:{}:", operation, dataset)
}

/// Prefixes of every table and column listing beneath `dataset`
pub fn dataset_prefixes(dataset: &str) -> [String; 2] {
    [prefix(TABLES, dataset), prefix(COLUMNS, dataset)]
}
