use redb::TableDefinition;

/// Records: "<table>/<zero-padded id>" -> StoredRecord (msgpack)
pub const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// Id sequences: table name -> last issued id
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");
