use crate::normalize::types::EntityTables;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes entity tables to JSON Lines files, one per entity type
pub struct TableWriter {
    output_dir: PathBuf,
}

impl TableWriter {
    /// Create a writer targeting `output_dir`, creating it if needed
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        std::fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

        Ok(TableWriter {
            output_dir: output_dir.as_ref().to_path_buf(),
        })
    }

    /// Write every table to `<type>.jsonl`, replacing existing files.
    /// Returns the paths written, in type order.
    pub fn write_tables(&self, entities: &EntityTables) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(entities.0.len());

        for (entity_type, table) in entities.iter() {
            let path = self.output_dir.join(table_file_name(entity_type)?);
            let file = File::create(&path)
                .with_context(|| format!("Failed to open file: {}", path.display()))?;
            let mut writer = BufWriter::new(file);

            for (_, record) in table.iter() {
                let json = serde_json::to_string(record).context("Failed to serialize entity")?;
                writeln!(writer, "{}", json).context("Failed to write entity")?;
            }

            writer.flush().context("Failed to flush writer")?;
            tracing::debug!(entity_type = %entity_type, records = table.len(), path = %path.display(), "wrote table");
            written.push(path);
        }

        Ok(written)
    }

    /// Write the result shape to `result.json`
    pub fn write_result(&self, result: &Value) -> Result<PathBuf> {
        let path = self.output_dir.join("result.json");
        let file = File::create(&path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, result).context("Failed to serialize result")?;
        writeln!(writer).context("Failed to write result")?;
        writer.flush().context("Failed to flush writer")?;

        Ok(path)
    }
}

/// File name for a table; names that could leave the output directory are rejected
fn table_file_name(entity_type: &str) -> Result<String> {
    if entity_type.is_empty()
        || entity_type == "."
        || entity_type.contains("..")
        || entity_type.contains(['/', '\\', '\0'])
    {
        bail!("Entity type `{}` cannot be used as a file name", entity_type);
    }
    Ok(format!("{}.jsonl", entity_type))
}

/// Writes every record to a single stream, tagged with its type and ID
pub struct SingleWriter<W: Write> {
    writer: W,
}

impl<W: Write> SingleWriter<W> {
    pub fn new(writer: W) -> Self {
        SingleWriter { writer }
    }

    pub fn write_tables(&mut self, entities: &EntityTables) -> Result<()> {
        for (entity_type, table) in entities.iter() {
            for (id, record) in table.iter() {
                let mut data = record.clone();

                // Add metadata
                data.insert("_entity_type".to_string(), Value::String(entity_type.clone()));
                data.insert("_entity_id".to_string(), Value::String(id.0.clone()));

                let json = serde_json::to_string(&data).context("Failed to serialize entity")?;
                writeln!(self.writer, "{}", json).context("Failed to write entity")?;
            }
        }
        Ok(())
    }

    /// Write the result shape as one `{"_result": ...}` line
    pub fn write_result(&mut self, result: &Value) -> Result<()> {
        let line = serde_json::json!({ "_result": result });
        let json = serde_json::to_string(&line).context("Failed to serialize result")?;
        writeln!(self.writer, "{}", json).context("Failed to write result")
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush writer")
    }
}
