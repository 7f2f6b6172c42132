use std::path::PathBuf;

use csv_core::WriteResult;

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Format {
    Table,
    Jsonl,
    Csv,
}

#[derive(clap::Parser, Clone, Debug)]
#[group(id = "output::Args")]
pub struct Args {
    /// Write to this file instead of the standard output.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    #[arg(long, short='f', value_enum, default_value_t = Format::Table)]
    format: Format,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open the specified output file at {1:?}")]
    OpenOutputFile(#[source] std::io::Error, PathBuf),
    #[error("could not write data to the output file at {1:?}")]
    WriteFile(#[source] std::io::Error, PathBuf),
    #[error("could not write data to the terminal")]
    WriteStdout(#[source] std::io::Error),
    #[error("could not serialize the record to JSON")]
    SerializeJson(#[source] serde_json::Error),
    #[error("CSV column headers must precede all the records")]
    LateCsvHeaders,
}

impl Args {
    pub fn to_output(self) -> Result<Output, Error> {
        let io = match &self.output {
            None => Box::new(std::io::stdout().lock()) as Box<dyn std::io::Write>,
            Some(path) => Box::new(
                std::fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|e| Error::OpenOutputFile(e, path.clone()))?,
            ),
        };
        let formatter = match &self.format {
            Format::Table => {
                let mut comfy = comfy_table::Table::new();
                comfy.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
                Formatter::Table { comfy }
            }
            Format::Jsonl => Formatter::Jsonl,
            Format::Csv => Formatter::Csv { started: false },
        };
        Ok(Output { path: self.output, io, formatter })
    }
}

/// A sink for tabular results, rendered as a table, CSV rows or JSON lines.
pub struct Output {
    path: Option<PathBuf>,
    io: Box<dyn std::io::Write>,
    formatter: Formatter,
}

enum Formatter {
    Csv { started: bool },
    Table { comfy: comfy_table::Table },
    Jsonl,
}

impl Output {
    pub fn headers(&mut self, headers: &[&'static str]) -> Result<(), Error> {
        match &mut self.formatter {
            Formatter::Csv { started: true } => return Err(Error::LateCsvHeaders),
            Formatter::Csv { started } => {
                *started = true;
                self.write_csv_row(headers)?;
            }
            Formatter::Table { comfy } => {
                comfy.set_header(headers.to_vec());
            }
            Formatter::Jsonl => {}
        }
        Ok(())
    }

    fn write_csv_row<V: AsRef<str>>(&mut self, values: &[V]) -> Result<(), Error> {
        let mut writer = csv_core::Writer::new();
        let mut line = Vec::new();
        let mut buffer = [0; 256];
        for (index, value) in values.iter().enumerate() {
            if index != 0 {
                let (_, written) = writer.delimiter(&mut buffer);
                line.extend_from_slice(&buffer[..written]);
            }
            let mut input = value.as_ref().as_bytes();
            loop {
                let (result, read, written) = writer.field(input, &mut buffer);
                line.extend_from_slice(&buffer[..written]);
                input = &input[read..];
                if let WriteResult::InputEmpty = result {
                    break;
                }
            }
        }
        let (_, written) = writer.terminator(&mut buffer);
        line.extend_from_slice(&buffer[..written]);
        self.io.write_all(&line).map_err(|e| self.write_error(e))
    }

    /// Emit one result. `row` is used for the tabular formats and `record` for JSON lines.
    pub fn record<R: serde::Serialize>(
        &mut self,
        row: impl FnOnce() -> Vec<String>,
        record: impl FnOnce() -> R,
    ) -> Result<(), Error> {
        match &mut self.formatter {
            Formatter::Csv { started } => {
                *started = true;
                let values = row();
                self.write_csv_row(&values)?;
            }
            Formatter::Table { comfy } => {
                comfy.add_row(row());
            }
            Formatter::Jsonl => {
                serde_json::to_writer(&mut self.io, &record()).map_err(Error::SerializeJson)?;
                writeln!(self.io).map_err(|e| self.write_error(e))?
            }
        }
        Ok(())
    }

    fn write_error(&self, e: std::io::Error) -> Error {
        match &self.path {
            None => Error::WriteStdout(e),
            Some(p) => Error::WriteFile(e, p.clone()),
        }
    }

    pub fn commit(mut self) -> Result<(), Error> {
        if let Formatter::Table { comfy } = &self.formatter {
            writeln!(self.io, "{comfy}").map_err(|e| self.write_error(e))?;
        }
        self.io.flush().map_err(|e| self.write_error(e))
    }
}
