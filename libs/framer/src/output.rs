//! Rendering frames for humans and spreadsheets.

use std::io::Write;

use arrow::util::pretty::pretty_format_batches;

use crate::Error;
use crate::frame::Frame;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
}

pub fn write_frames<W: Write>(
    frames: &[Frame],
    format: OutputFormat,
    mut writer: W,
) -> Result<(), Error> {
    for frame in frames {
        match format {
            OutputFormat::Table => {
                writeln!(writer, "{} ({} rows)", frame.name, frame.len())?;
                let table = pretty_format_batches(std::slice::from_ref(frame.batch()))?;
                writeln!(writer, "{table}")?;
            }
            OutputFormat::Csv => {
                let mut csv = arrow::csv::WriterBuilder::new()
                    .with_header(true)
                    .build(&mut writer);
                csv.write(frame.batch())?;
            }
        }
    }
    Ok(())
}
