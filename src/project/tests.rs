//! Orchestrator tests

use super::*;
use crate::config::load_config;
use ndarray::Array2;
use tempfile::TempDir;

fn frame(rows: usize) -> DataFrame {
    let x = Array2::from_shape_fn((rows, 2), |(r, c)| ((r * (c + 3)) % 17) as f32 / 17.0);
    let y = Array2::from_shape_fn((rows, 1), |(r, _)| x[[r, 0]] + 2.0 * x[[r, 1]]);
    DataFrame::new(vec!["a".into(), "b".into()], vec!["y".into()], x, y).unwrap()
}

fn quick_config() -> Config {
    Config::default()
        .with_epochs(5)
        .with_hidden_layers(vec![4])
        .with_learning_rate(0.01)
}

fn orchestrator(dir: &TempDir, processes: usize) -> ProjectOrchestrator {
    let mut orch = ProjectOrchestrator::new(dir.path(), processes).unwrap();
    orch.set_config(quick_config()).unwrap();
    orch
}

#[test]
fn test_zero_processes_rejected() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        ProjectOrchestrator::new(dir.path(), 0),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn test_new_regenerates_config_with_process_count() {
    let dir = TempDir::new().unwrap();
    let orch = ProjectOrchestrator::new(dir.path(), 3).unwrap();
    assert_eq!(orch.config().process_count, 3);
    let on_disk = load_config(dir.path().join(CONFIG_FILE)).unwrap();
    assert_eq!(on_disk.process_count, 3);
    assert_eq!(on_disk.epochs, Config::default().epochs);
}

#[test]
fn test_new_keeps_existing_config_values() {
    let dir = TempDir::new().unwrap();
    save_config(&Config::default().with_epochs(7), dir.path().join(CONFIG_FILE)).unwrap();
    let orch = ProjectOrchestrator::new(dir.path(), 2).unwrap();
    assert_eq!(orch.config().epochs, 7);
    assert_eq!(orch.config().process_count, 2);
}

#[test]
fn test_set_config_keeps_worker_count_and_validates() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(&dir, 2);
    assert_eq!(orch.config().process_count, 2);
    assert!(matches!(
        orch.set_config(Config::default().with_epochs(0)),
        Err(Error::ConfigError(_))
    ));
    assert_eq!(orch.config().epochs, 5);
}

#[test]
fn test_create_project_validates_topology_first() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(&dir, 1);
    assert!(matches!(
        orch.create_project("p", 0, 3),
        Err(Error::InvalidTopology {
            pools: 0,
            candidates: 3
        })
    ));
    assert!(!dir.path().join("p").exists());
    assert!(orch.project_name().is_none());
}

#[test]
fn test_create_project_refuses_existing_and_illegal_names() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(&dir, 1);
    orch.create_project("p", 1, 1).unwrap();
    assert!(matches!(orch.create_project("p", 1, 1), Err(Error::Project(_))));
    for bad in ["", "..", "a/b", "x.prj"] {
        assert!(matches!(
            orch.create_project(bad, 1, 1),
            Err(Error::InvalidParameter(_))
        ));
    }
}

#[test]
fn test_create_project_writes_manifest_and_config() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(&dir, 1);
    orch.create_project("p", 2, 2).unwrap();
    assert!(dir.path().join("p/project.yml").is_file());
    assert_eq!(load_config(dir.path().join("p/config.yml")).unwrap().epochs, 5);
    assert_eq!(orch.topology(), Some((2, 2)));
    assert_eq!(orch.winners(), vec![None, None]);
}

#[test]
fn test_train_requires_project_and_data() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(&dir, 1);
    assert!(matches!(orch.train(), Err(Error::Project(_))));
    orch.create_project("p", 1, 1).unwrap();
    assert!(matches!(orch.train(), Err(Error::Data(_))));
}

#[test]
fn test_predict_before_training_is_not_trained() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(&dir, 1);
    orch.load_frame(&frame(30), &DataOptions::default()).unwrap();
    assert!(matches!(orch.predict(None), Err(Error::NotTrained)));
    orch.create_project("p", 1, 2).unwrap();
    assert!(matches!(orch.predict(None), Err(Error::NotTrained)));
    assert!(matches!(
        orch.predict_subset(SubsetKind::Test),
        Err(Error::NotTrained)
    ));
}

#[test]
fn test_memory_backend_full_cycle() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(&dir, 2).with_backend(StoreBackend::Memory);
    orch.load_frame(&frame(40), &DataOptions::default().with_normalize(true))
        .unwrap();
    orch.create_project("mem", 2, 2).unwrap();
    assert!(!dir.path().join("mem").exists());

    let report = orch.train().unwrap();
    assert!(report.failures().is_empty());
    assert_eq!(orch.winners(), report.winners());

    let predictions = orch.predict(None).unwrap();
    assert_eq!(predictions.dim(), (40, 1));
    assert_eq!(orch.predict_subset(SubsetKind::Test).unwrap().nrows(), 4);

    let archive = orch.save_project().unwrap();
    assert!(archive.is_file());
    assert!(orch.project_name().is_none());

    let mut fresh = ProjectOrchestrator::new(dir.path(), 1)
        .unwrap()
        .with_backend(StoreBackend::Memory);
    fresh.load_project("mem").unwrap();
    assert!(!archive.exists());
    assert_eq!(fresh.winners(), report.winners());
    assert_eq!(fresh.config().epochs, 5);
    assert_eq!(fresh.config().process_count, 1);

    // no dataset loaded: raw rows go through the recorded preprocessing
    let again = fresh.predict_frame(&frame(40)).unwrap();
    for (a, b) in again.iter().zip(predictions.iter()) {
        approx::assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
    }
}

#[test]
fn test_predict_frame_checks_width() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(&dir, 1).with_backend(StoreBackend::Memory);
    orch.load_frame(&frame(20), &DataOptions::default()).unwrap();
    orch.create_project("w", 1, 1).unwrap();
    orch.train().unwrap();

    let wide = DataFrame::new(
        vec!["a".into(), "b".into(), "c".into()],
        vec!["y".into()],
        Array2::zeros((3, 3)),
        Array2::zeros((3, 1)),
    )
    .unwrap();
    assert!(matches!(orch.predict_frame(&wide), Err(Error::Data(_))));
}

#[test]
fn test_save_requires_open_project() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(&dir, 1);
    assert!(matches!(orch.save_project(), Err(Error::Project(_))));
}

#[test]
fn test_save_is_refused_when_archive_exists() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(&dir, 1);
    orch.create_project("p", 1, 1).unwrap();
    std::fs::write(dir.path().join("p.prj"), b"stale").unwrap();
    assert!(matches!(orch.save_project(), Err(Error::Project(_))));
    assert!(dir.path().join("p").is_dir());
}

#[test]
fn test_load_missing_archive() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(&dir, 1);
    assert!(matches!(orch.load_project("ghost"), Err(Error::Project(_))));
}

#[test]
fn test_load_corrupt_archive_leaves_nothing_expanded() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("bad.prj");
    std::fs::write(&archive, b"PRJ\0garbage").unwrap();
    let mut orch = orchestrator(&dir, 1);
    assert!(matches!(
        orch.load_project("bad"),
        Err(Error::CorruptArchive { .. })
    ));
    assert!(!dir.path().join("bad").exists());
    assert!(archive.exists());
    assert!(orch.project_name().is_none());
}

#[test]
fn test_load_rejects_manifest_topology_mismatch() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(&dir, 1);
    orch.create_project("p", 2, 2).unwrap();
    let lying = Manifest::new("p", 3, 2);
    std::fs::write(dir.path().join("p/project.yml"), lying.to_yaml().unwrap()).unwrap();
    // save rewrites the manifest from memory, so pack the directory by hand
    let store = FsStore::new(dir.path(), "p");
    store.pack(&dir.path().join("p.prj")).unwrap();
    store.clear().unwrap();

    let mut other = orchestrator(&dir, 1);
    assert!(matches!(
        other.load_project("p"),
        Err(Error::CorruptArchive { .. })
    ));
    assert!(!dir.path().join("p").exists());
}

fn trained(dir: &TempDir, name: &str) -> ProjectOrchestrator {
    let mut orch = orchestrator(dir, 2);
    orch.load_frame(&frame(40), &DataOptions::default().with_normalize(true))
        .unwrap();
    orch.create_project(name, 2, 2).unwrap();
    orch.train().unwrap();
    orch
}

#[test]
fn test_save_refuses_foreign_files_and_keeps_directory() {
    let dir = TempDir::new().unwrap();
    let mut orch = trained(&dir, "p");
    std::fs::write(dir.path().join("p/README.txt"), b"notes").unwrap();

    assert!(matches!(orch.save_project(), Err(Error::Project(_))));
    assert!(dir.path().join("p/pool_0/model.h5").is_file());
    assert!(!dir.path().join("p.prj").exists());
    assert_eq!(orch.project_name(), Some("p"));

    std::fs::remove_file(dir.path().join("p/README.txt")).unwrap();
    orch.save_project().unwrap();
    orch.load_project("p").unwrap();
}

#[test]
fn test_predict_frame_ignores_later_loaded_data() {
    let dir = TempDir::new().unwrap();
    let mut orch = trained(&dir, "p");
    let query = frame(10);
    let before = orch.predict_frame(&query).unwrap();

    let shifted = DataFrame::new(
        vec!["a".into(), "b".into()],
        vec!["y".into()],
        Array2::from_shape_fn((30, 2), |(r, c)| 100.0 + (r * (c + 1)) as f32 * 3.0),
        Array2::zeros((30, 1)),
    )
    .unwrap();
    orch.load_frame(&shifted, &DataOptions::default().with_normalize(true))
        .unwrap();
    assert_eq!(orch.predict_frame(&query).unwrap(), before);
}

#[test]
fn test_reloaded_project_predicts_its_own_rows() {
    let dir = TempDir::new().unwrap();
    let mut orch = trained(&dir, "p");
    let live = orch.predict(None).unwrap();
    let rows = orch.dataset().cloned().unwrap();
    orch.save_project().unwrap();

    let mut fresh = ProjectOrchestrator::new(dir.path(), 1).unwrap();
    fresh.load_project("p").unwrap();
    assert_eq!(fresh.dataset(), Some(&rows));
    assert_eq!(fresh.predict(None).unwrap(), live);
    assert_eq!(
        fresh.predict_subset(SubsetKind::Valid).unwrap().nrows(),
        rows.valid.len()
    );
}

#[test]
fn test_open_keeps_recorded_worker_count() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE);
    let mut recorded = Config::default().with_epochs(7);
    recorded.process_count = 3;
    save_config(&recorded, &path).unwrap();
    let before = std::fs::read(&path).unwrap();

    let orch = ProjectOrchestrator::open(dir.path()).unwrap();
    assert_eq!(orch.config().process_count, 3);
    assert_eq!(orch.config().epochs, 7);
    assert_eq!(std::fs::read(&path).unwrap(), before);
}
