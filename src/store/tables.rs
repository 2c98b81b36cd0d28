use redb::TableDefinition;

/// Token material: slot name -> raw bearer token
pub const TOKENS: TableDefinition<&str, &str> = TableDefinition::new("tokens");

/// Coarse client flags: flag name -> value
pub const FLAGS: TableDefinition<&str, bool> = TableDefinition::new("flags");
