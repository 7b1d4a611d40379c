//! End-to-end sweeps through the public API.

use approx::assert_abs_diff_eq;

use eim_rust::error::EimError;
use eim_rust::field::{FieldMap, Grid};
use eim_rust::mode_solver::SlabSolver;
use eim_rust::parallel::Execution;
use eim_rust::sweep::{Collector, FieldRow, Geometry, RowSink, ScalarRow, Sweep, SweepPlan};
use eim_rust::types::{Polarization, WaveguideKind};

fn slot_plan() -> SweepPlan {
    SweepPlan {
        geometry: Geometry {
            kind: WaveguideKind::Slot,
            polarization: Polarization::TE,
            t_core: 0.22,
            t_slab: 0.0,
            n_box: 1.44,
            n_core: 3.47,
            n_clad: 1.44,
            n_slot: Some(1.44),
        },
        wavelengths: vec![1.55],
        widths: vec![0.2, 0.25],
        gaps: vec![0.05, 0.1],
        mode_orders: vec![0],
        field: None,
    }
}

#[test]
fn slot_sweep_orders_gap_before_width() {
    let mut sink = Collector::default();
    Sweep::new(slot_plan(), SlabSolver::default(), Execution::Serial)
        .run(&mut sink)
        .unwrap();

    let keys: Vec<(Option<f64>, f64)> = sink.rows.iter().map(|r| (r.gap, r.width)).collect();
    assert_eq!(
        keys,
        vec![(Some(0.05), 0.2), (Some(0.05), 0.25), (Some(0.1), 0.2), (Some(0.1), 0.25)]
    );
    assert!(sink.rows.iter().all(|r| r.guided));

    let reference = sink.rows[3];
    assert_abs_diff_eq!(reference.neff, 2.0737, epsilon = 2e-3);
    // Narrower gaps couple the rails more strongly.
    assert!(sink.rows[1].neff > reference.neff);
}

#[test]
fn threaded_and_serial_sweeps_agree() {
    let plan = SweepPlan {
        field: Some(Grid::new(15, 0.8)),
        ..slot_plan()
    };
    let mut serial = Collector::default();
    let mut threaded = Collector::default();
    Sweep::new(plan.clone(), SlabSolver::default(), Execution::Serial)
        .run(&mut serial)
        .unwrap();
    Sweep::new(
        plan,
        SlabSolver::new(Default::default(), Execution::Threads(2)),
        Execution::Threads(4),
    )
    .run(&mut threaded)
    .unwrap();

    assert_eq!(serial.rows, threaded.rows);
    assert_eq!(serial.maps, threaded.maps);
}

/// Counts field samples and fails on demand.
#[derive(Default)]
struct Counting {
    scalars: usize,
    samples: usize,
    fail_after: Option<usize>,
}

impl RowSink for Counting {
    fn scalar(&mut self, _row: &ScalarRow) -> Result<(), EimError> {
        if Some(self.scalars) == self.fail_after {
            return Err(EimError::Io(std::io::Error::other("disk full")));
        }
        self.scalars += 1;
        Ok(())
    }

    fn field(&mut self, _point: &ScalarRow, _row: &FieldRow) -> Result<(), EimError> {
        self.samples += 1;
        Ok(())
    }
}

#[test]
fn default_field_map_forwards_every_sample() {
    let plan = SweepPlan {
        widths: vec![0.25],
        gaps: vec![0.1],
        field: Some(Grid::new(9, 1.0)),
        ..slot_plan()
    };
    let mut sink = Counting::default();
    let summary = Sweep::new(plan, SlabSolver::default(), Execution::Threads(3))
        .run(&mut sink)
        .unwrap();
    assert_eq!(summary.rows, 1);
    assert_eq!(summary.field_maps, 1);
    assert_eq!(sink.samples, 81);
}

#[test]
fn sink_errors_abort_the_sweep() {
    let mut sink = Counting {
        fail_after: Some(2),
        ..Counting::default()
    };
    let err = Sweep::new(slot_plan(), SlabSolver::default(), Execution::Serial)
        .run(&mut sink)
        .unwrap_err();
    assert!(matches!(err, EimError::Io(_)));
    assert_eq!(sink.scalars, 2);
}

#[test]
fn strip_field_map_is_centred() {
    let plan = SweepPlan {
        geometry: Geometry {
            kind: WaveguideKind::Strip,
            n_slot: None,
            ..slot_plan().geometry
        },
        widths: vec![0.5],
        gaps: Vec::new(),
        field: Some(Grid::new(41, 1.0)),
        ..slot_plan()
    };
    let mut sink = Collector::default();
    Sweep::new(plan, SlabSolver::default(), Execution::available())
        .run(&mut sink)
        .unwrap();

    let (point, map): &(ScalarRow, FieldMap) = &sink.maps[0];
    assert_eq!(point.kind, WaveguideKind::Strip);
    assert_abs_diff_eq!(point.neff, 2.4843, epsilon = 2e-3);
    let (row, col, _) = map.peak();
    assert_eq!((row, col), (20, 20));
}
