use std::sync::Arc;
use xlquery::fragmentation::{
    FragmentationConfig,
    GeneratorRegistry,
};
use xlquery::{
    BuildOptions,
    Catalog,
    DiskMassIndex,
    FragmentGenerator,
    FragmentLookup,
    IndexBuilder,
    MassQuery,
    Peptide,
    PeptideId,
    PeptideTable,
    StopFlag,
    ToleranceUnit,
};
use xlquery::errors::XlqueryError;

fn peptides() -> Arc<PeptideTable> {
    let catalog = Catalog::default();
    let seqs = [
        "PEPTIDEK", "EPPTIDEK", "KLINKER", "GGGK", "GGGR", "AAAAK", "SAMPLER", "MKTAYIAK",
        "QRLEDK", "WWK",
    ];
    Arc::new(
        seqs.iter()
            .map(|s| Peptide::try_new(s, &catalog).unwrap())
            .collect(),
    )
}

fn builder(peptides: &Arc<PeptideTable>, cap: Option<usize>) -> IndexBuilder {
    let scheme = GeneratorRegistry::with_defaults()
        .resolve(&FragmentationConfig {
            generators: vec!["b-ions".into(), "y-ions".into(), "precursor".into()],
            losses: vec!["water-loss".into()],
            max_loss_count: 1,
        })
        .unwrap();
    IndexBuilder::new(peptides.clone(), Arc::new(Catalog::default()), Arc::new(scheme))
        .with_tolerance(ToleranceUnit::Ppm(10.0))
        .with_options(BuildOptions {
            shard_count: 3,
            candidate_cap: cap,
            ..Default::default()
        })
}

fn ids(found: Vec<&Peptide>) -> Vec<PeptideId> {
    found.iter().map(|p| p.id()).collect()
}

fn all_fragment_masses(peptides: &PeptideTable) -> Vec<f64> {
    let scheme = GeneratorRegistry::with_defaults()
        .resolve(&FragmentationConfig::default())
        .unwrap();
    let catalog = Catalog::default();
    let mut out: Vec<f64> = peptides
        .iter()
        .flat_map(|p| scheme.fragments(p, &catalog).unwrap())
        .map(|f| f.mass)
        .collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

#[test]
fn test_disk_matches_memory() {
    let peptides = peptides();
    for cap in [None, Some(1), Some(2)] {
        let (memory, _) = builder(&peptides, cap).build().unwrap();
        let (disk, stats) = builder(&peptides, cap).build_on_disk(None).unwrap();
        println!("{}", stats);
        assert_eq!(
            memory.fragment_count().unwrap(),
            disk.fragment_count().unwrap()
        );
        assert_eq!(memory.mass_count(), disk.mass_count().unwrap());

        for mass in all_fragment_masses(&peptides) {
            assert_eq!(
                memory.count(mass, None).unwrap(),
                disk.count(mass, None).unwrap()
            );
            assert_eq!(
                ids(memory.query(&MassQuery::new(mass)).unwrap()),
                ids(disk.query(&MassQuery::new(mass)).unwrap())
            );
            assert_eq!(
                ids(memory.exact(mass).unwrap()),
                ids(disk.exact(mass).unwrap())
            );
        }
        // walking back down forces reloads of the cache window
        for mass in all_fragment_masses(&peptides).into_iter().rev() {
            let q = MassQuery::new(mass).with_max_candidates(1).with_ceiling(900.0);
            assert_eq!(
                ids(memory.query(&q).unwrap()),
                ids(disk.query(&q).unwrap())
            );
        }

        let mut a = Vec::new();
        let mut b = Vec::new();
        memory.dump(&mut a).unwrap();
        disk.dump(&mut b).unwrap();
        assert_eq!(String::from_utf8(a).unwrap(), String::from_utf8(b).unwrap());
    }
}

#[test]
fn test_reopen_from_file() {
    let dir = std::env::temp_dir().join("xlquery_test_disk_reopen");
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("fragments.sqlite");

    let peptides = peptides();
    let (built, _) = builder(&peptides, Some(3))
        .build_on_disk(Some(path.clone()))
        .unwrap();
    let expected = built.fragment_count().unwrap();
    drop(built);

    let reopened =
        DiskMassIndex::open(&path, peptides.clone(), ToleranceUnit::Ppm(10.0)).unwrap();
    assert_eq!(reopened.fragment_count().unwrap(), expected);
    // y1 of the seven K peptides is above the cap, y1 of the three R peptides is not
    let y1_k = 128.094_963_01 + 18.010_564_683_7;
    assert!(reopened.query(&MassQuery::new(y1_k)).unwrap().is_empty());
    let y1_r = 156.101_111_03 + 18.010_564_683_7;
    assert_eq!(reopened.query(&MassQuery::new(y1_r)).unwrap().len(), 3);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_disk_build_honours_stop_flag() {
    let stop = StopFlag::new();
    stop.request_stop();
    let res = builder(&peptides(), None)
        .with_stop_flag(stop)
        .build_on_disk(None);
    assert!(matches!(res, Err(XlqueryError::Cancelled)));
}
