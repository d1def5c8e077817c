//! Arrow schema definitions for the Chirpy Delta tables
//!
//! Each table has:
//! - An Arrow `Schema` for RecordBatch construction
//! - A list of Delta `StructField`s for table creation
//! - Partition columns (none: every table is small and keyed by id)
//!
//! Timestamps are stored as RFC 3339 strings with microsecond precision.

use deltalake::arrow::datatypes::{DataType, Field, Schema};
use deltalake::kernel::{DataType as DeltaDataType, PrimitiveType, StructField};

// ─── Table Names (constants) ───

pub const TABLE_USERS: &str = "users";
pub const TABLE_REFRESH_TOKENS: &str = "refresh_tokens";
pub const TABLE_CHIRPS: &str = "chirps";

fn string_field(name: &str, nullable: bool) -> StructField {
    StructField::new(name, DeltaDataType::Primitive(PrimitiveType::String), nullable)
}

// ─── Users Table ───

/// Arrow schema for the `users` Delta table
pub fn users_arrow_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("email", DataType::Utf8, false),
        Field::new("hashed_password", DataType::Utf8, false),
        Field::new("is_chirpy_red", DataType::Boolean, false),
        Field::new("created_at", DataType::Utf8, false),
        Field::new("updated_at", DataType::Utf8, false),
    ])
}

/// Delta StructFields for `users` table creation
pub fn users_delta_fields() -> Vec<StructField> {
    vec![
        string_field("id", false),
        string_field("email", false),
        string_field("hashed_password", false),
        StructField::new("is_chirpy_red", DeltaDataType::Primitive(PrimitiveType::Boolean), false),
        string_field("created_at", false),
        string_field("updated_at", false),
    ]
}

// ─── Refresh Tokens Table ───

/// Arrow schema for the `refresh_tokens` Delta table
pub fn refresh_tokens_arrow_schema() -> Schema {
    Schema::new(vec![
        Field::new("token", DataType::Utf8, false),
        Field::new("user_id", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
        Field::new("updated_at", DataType::Utf8, false),
        Field::new("expires_at", DataType::Utf8, false),
        Field::new("revoked_at", DataType::Utf8, true),
    ])
}

/// Delta StructFields for `refresh_tokens` table creation
pub fn refresh_tokens_delta_fields() -> Vec<StructField> {
    vec![
        string_field("token", false),
        string_field("user_id", false),
        string_field("created_at", false),
        string_field("updated_at", false),
        string_field("expires_at", false),
        string_field("revoked_at", true),
    ]
}

// ─── Chirps Table ───

/// Arrow schema for the `chirps` Delta table
pub fn chirps_arrow_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("body", DataType::Utf8, false),
        Field::new("user_id", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
        Field::new("updated_at", DataType::Utf8, false),
    ])
}

/// Delta StructFields for `chirps` table creation
pub fn chirps_delta_fields() -> Vec<StructField> {
    vec![
        string_field("id", false),
        string_field("body", false),
        string_field("user_id", false),
        string_field("created_at", false),
        string_field("updated_at", false),
    ]
}

// ─── Table Registry ───

/// Table definition used by `DeltaStore::new` to create missing tables
pub struct TableDefinition {
    pub name: &'static str,
    pub delta_fields: Vec<StructField>,
    pub partition_columns: Vec<String>,
}

/// All tables the credential store needs
pub fn all_tables() -> Vec<TableDefinition> {
    vec![
        TableDefinition {
            name: TABLE_USERS,
            delta_fields: users_delta_fields(),
            partition_columns: vec![],
        },
        TableDefinition {
            name: TABLE_REFRESH_TOKENS,
            delta_fields: refresh_tokens_delta_fields(),
            partition_columns: vec![],
        },
        TableDefinition {
            name: TABLE_CHIRPS,
            delta_fields: chirps_delta_fields(),
            partition_columns: vec![],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_and_delta_schemas_agree() {
        let pairs = [
            (users_arrow_schema(), users_delta_fields()),
            (refresh_tokens_arrow_schema(), refresh_tokens_delta_fields()),
            (chirps_arrow_schema(), chirps_delta_fields()),
        ];
        for (arrow, delta) in pairs {
            let arrow_names: Vec<&str> = arrow.fields().iter().map(|f| f.name().as_str()).collect();
            let delta_names: Vec<&str> = delta.iter().map(|f| f.name().as_str()).collect();
            assert_eq!(arrow_names, delta_names);
        }
    }

    #[test]
    fn test_revoked_at_is_the_only_nullable_column() {
        let nullable: Vec<String> = all_tables()
            .into_iter()
            .flat_map(|t| t.delta_fields)
            .filter(|f| f.is_nullable())
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(nullable, vec!["revoked_at".to_string()]);
    }
}
