//! CSV sinks for sweep results.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use eim_rust::error::EimError;
use eim_rust::field::{FieldMap, FieldSample};
use eim_rust::sweep::{FieldRow, RowSink, ScalarRow};
use eim_rust::types::{Polarization, WaveguideKind};

/// Field map file used when none is given on the command line.
pub fn default_field_path(kind: WaveguideKind) -> PathBuf {
    match kind {
        WaveguideKind::Strip => PathBuf::from("mode2D_strip.csv"),
        WaveguideKind::Slot => PathBuf::from("mode2D_slot.csv"),
    }
}

fn scalar_header(kind: WaveguideKind) -> &'static str {
    match kind {
        WaveguideKind::Strip => "t_slab,t_rib,width,wavelength,mode,neff,guided",
        WaveguideKind::Slot => "t_core,w_core,w_slot,wavelength,mode,neff,guided",
    }
}

fn field_header(kind: WaveguideKind) -> &'static str {
    match kind {
        WaveguideKind::Strip => "t_slab,t_rib,width,mode,transverse,lateral,amplitude",
        WaveguideKind::Slot => "t_core,w_core,w_slot,mode,transverse,lateral,amplitude",
    }
}

/// The three geometry columns that lead every row.
fn geometry_columns(point: &ScalarRow) -> String {
    match point.kind {
        WaveguideKind::Strip => format!("{},{},{}", point.t_slab, point.t_core, point.width),
        WaveguideKind::Slot => format!(
            "{},{},{}",
            point.t_core,
            point.width,
            point.gap.unwrap_or_default()
        ),
    }
}

/// Writes scalar rows to one writer and, optionally, field samples to
/// another. Headers are written on construction.
pub struct CsvSink<S: Write, F: Write> {
    scalars: S,
    fields: Option<F>,
}

impl<S: Write, F: Write> CsvSink<S, F> {
    pub fn new(kind: WaveguideKind, mut scalars: S, mut fields: Option<F>) -> io::Result<Self> {
        writeln!(scalars, "{}", scalar_header(kind))?;
        if let Some(fields) = fields.as_mut() {
            writeln!(fields, "{}", field_header(kind))?;
        }
        Ok(Self { scalars, fields })
    }

    pub fn into_inner(self) -> (S, Option<F>) {
        (self.scalars, self.fields)
    }
}

impl<S: Write, F: Write> RowSink for CsvSink<S, F> {
    fn scalar(&mut self, row: &ScalarRow) -> Result<(), EimError> {
        writeln!(
            self.scalars,
            "{},{},{},{:.6},{}",
            geometry_columns(row),
            row.wavelength,
            row.mode,
            row.neff,
            row.guided
        )?;
        Ok(())
    }

    fn field(&mut self, point: &ScalarRow, row: &FieldRow) -> Result<(), EimError> {
        if let Some(fields) = self.fields.as_mut() {
            writeln!(
                fields,
                "{},{},{},{},{:.6e}",
                geometry_columns(point),
                point.mode,
                row.transverse,
                row.lateral,
                row.amplitude
            )?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EimError> {
        self.scalars.flush()?;
        if let Some(fields) = self.fields.as_mut() {
            fields.flush()?;
        }
        Ok(())
    }
}

/// Forwards to another sink and, when `keep` is set, retains every field
/// map for plotting.
pub struct Recording<K> {
    pub inner: K,
    pub maps: Vec<(ScalarRow, FieldMap)>,
    keep: bool,
}

impl<K: RowSink> Recording<K> {
    pub fn new(inner: K, keep: bool) -> Self {
        Self {
            inner,
            maps: Vec::new(),
            keep,
        }
    }
}

impl<K: RowSink> RowSink for Recording<K> {
    fn scalar(&mut self, row: &ScalarRow) -> Result<(), EimError> {
        self.inner.scalar(row)
    }

    fn field(&mut self, point: &ScalarRow, row: &FieldRow) -> Result<(), EimError> {
        self.inner.field(point, row)
    }

    fn field_map(&mut self, point: &ScalarRow, map: &FieldMap) -> Result<(), EimError> {
        self.inner.field_map(point, map)?;
        if self.keep {
            self.maps.push((*point, map.clone()));
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EimError> {
        self.inner.finish()
    }
}

pub const PROFILE_HEADER: &str = "polarization,neff,position,electric,magnetic,longitudinal_im";

/// One 1D mode, one row per position. The longitudinal component is
/// purely imaginary, so only its imaginary part is written.
pub fn write_profile<W: Write>(
    out: &mut W,
    polarization: Polarization,
    neff: f64,
    positions: &[f64],
    samples: &[FieldSample],
) -> io::Result<()> {
    for (x, s) in positions.iter().zip(samples) {
        writeln!(
            out,
            "{polarization},{neff:.6},{x},{:.6e},{:.6e},{:.6e}",
            s.electric.re, s.magnetic.re, s.longitudinal.im
        )?;
    }
    Ok(())
}

pub fn create_file(path: &Path) -> io::Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use eim_rust::types::ModeLabel;
    use nalgebra::DMatrix;
    use num_complex::Complex64;

    fn point(kind: WaveguideKind) -> ScalarRow {
        ScalarRow {
            kind,
            t_core: 0.22,
            t_slab: 0.0,
            width: 0.5,
            gap: (kind == WaveguideKind::Slot).then_some(0.1),
            wavelength: 1.55,
            mode: ModeLabel::new(Polarization::TE, 0),
            neff: 2.484312,
            guided: true,
        }
    }

    #[test]
    fn test_strip_rows() {
        let mut sink =
            CsvSink::new(WaveguideKind::Strip, Vec::new(), Some(Vec::new())).unwrap();
        let map = FieldMap {
            transverse: vec![-1.0, 1.0],
            lateral: vec![-1.0, 1.0],
            amplitude: DMatrix::from_element(2, 2, Complex64::new(0.0, 0.5)),
        };
        sink.scalar(&point(WaveguideKind::Strip)).unwrap();
        sink.field_map(&point(WaveguideKind::Strip), &map).unwrap();
        sink.finish().unwrap();

        let (scalars, fields) = sink.into_inner();
        let scalars = String::from_utf8(scalars).unwrap();
        let fields = String::from_utf8(fields.unwrap()).unwrap();
        assert_eq!(
            scalars,
            "t_slab,t_rib,width,wavelength,mode,neff,guided\n0,0.22,0.5,1.55,TE0,2.484312,true\n"
        );
        let lines: Vec<&str> = fields.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "0,0.22,0.5,TE0,-1,-1,5.000000e-1");
    }

    #[test]
    fn test_profile_rows() {
        let sample = FieldSample {
            electric: Complex64::new(1.0, 0.0),
            magnetic: Complex64::new(-0.25, 0.0),
            longitudinal: Complex64::new(0.0, 0.002),
        };
        let mut out = Vec::new();
        write_profile(&mut out, Polarization::TE, 2.84, &[-0.5, 0.5], &[sample, sample]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "TE,2.840000,-0.5,1.000000e0,-2.500000e-1,2.000000e-3");
        assert_eq!(PROFILE_HEADER.split(',').count(), lines[1].split(',').count());
    }

    #[test]
    fn test_slot_rows_without_field_file() {
        let mut sink = CsvSink::new(WaveguideKind::Slot, Vec::new(), None::<Vec<u8>>).unwrap();
        sink.scalar(&point(WaveguideKind::Slot)).unwrap();
        let (scalars, fields) = sink.into_inner();
        assert!(fields.is_none());
        let scalars = String::from_utf8(scalars).unwrap();
        assert_eq!(scalars.lines().nth(1), Some("0.22,0.5,0.1,1.55,TE0,2.484312,true"));
        assert_eq!(default_field_path(WaveguideKind::Slot), PathBuf::from("mode2D_slot.csv"));
    }
}
