use std::sync::Arc;
use xlquery::fragmentation::{
    FragmentationConfig,
    FragmentationScheme,
    GeneratorRegistry,
};
use xlquery::{
    Catalog,
    Fragment,
    IndexBuilder,
    Peptide,
    PeptideTable,
    StopFlag,
    ToleranceUnit,
};
use xlseek::{
    CandidateOptions,
    CrossLinker,
    FragmentMatcher,
    LinkSites,
    MatchBuilder,
    ResidueRestrictedCrossLinker,
    ResolutionMode,
    SiteResolver,
    Spectrum,
    SpectrumMatch,
    SpectrumPeak,
    alpha_candidates,
    resolve_all,
};

const LINKER_MASS: f64 = 138.068_079_6;

fn table(seqs: &[&str]) -> PeptideTable {
    let catalog = Catalog::default();
    seqs.iter()
        .map(|s| Peptide::try_new(s, &catalog).unwrap())
        .collect()
}

fn scheme() -> FragmentationScheme {
    GeneratorRegistry::with_defaults()
        .resolve(&FragmentationConfig {
            generators: vec!["b-ions".into(), "y-ions".into(), "precursor".into()],
            losses: vec![],
            max_loss_count: 0,
        })
        .unwrap()
}

fn lysine_linker() -> ResidueRestrictedCrossLinker {
    ResidueRestrictedCrossLinker::new("lys", LINKER_MASS, &[('K', 0.0)])
}

fn spectrum_of(fragments: &[Arc<Fragment>]) -> Spectrum {
    let peaks = fragments
        .iter()
        .map(|f| SpectrumPeak::new(f.mz(1), 100.0))
        .collect();
    Spectrum::try_new("synthetic", 1500.0, 1, peaks).unwrap()
}

#[test]
fn test_noise_free_spectrum_resolves_to_true_site() {
    let peptides = table(&["GKAGKAR", "SKAKLR"]);
    let (p1, p2) = (&peptides.as_slice()[0], &peptides.as_slice()[1]);
    let catalog = Catalog::default();
    let scheme = scheme();
    let linker = lysine_linker();
    let builder = MatchBuilder {
        scheme: &scheme,
        catalog: &catalog,
        linker: &linker,
        matcher: FragmentMatcher::new(ToleranceUnit::Ppm(5.0)),
    };
    let theoretical = builder.theoretical_fragments(p1, Some(p2)).unwrap();

    for (i, j) in [(1, 1), (1, 3), (4, 1), (4, 3)] {
        let consistent: Vec<Arc<Fragment>> = theoretical
            .iter()
            .filter(|f| f.can_fulfill_link_pair(p1.id(), i, p2.id(), j))
            .cloned()
            .collect();
        let mut m = builder
            .build(spectrum_of(&consistent), p1.clone(), Some(p2.clone()))
            .unwrap();
        let before = m.spectrum.annotation_count();
        let res = SiteResolver::new(&linker).resolve(&mut m);
        println!("true ({}, {}): {:?}, {} annotations", i, j, res, before);
        assert_eq!(res.sites, LinkSites::pair(i, j));
        assert_eq!(m.sites, res.sites);
        assert_eq!(m.spectrum.annotation_count(), before - res.retracted);
        assert_eq!(m.fragments.annotation_count(), m.spectrum.annotation_count());
    }
}

fn peptidek_klinker_match() -> (SpectrumMatch, ResidueRestrictedCrossLinker) {
    let peptides = table(&["PEPTIDEK", "KLINKER"]);
    let (p1, p2) = (&peptides.as_slice()[0], &peptides.as_slice()[1]);
    let catalog = Catalog::default();
    let scheme = scheme();
    let linker = lysine_linker();
    let builder = MatchBuilder {
        scheme: &scheme,
        catalog: &catalog,
        linker: &linker,
        matcher: FragmentMatcher::new(ToleranceUnit::Ppm(5.0)),
    };
    let theoretical = builder.theoretical_fragments(p1, Some(p2)).unwrap();
    let pick = |name: &str, peptide: &Peptide, crosslinked: bool| {
        theoretical
            .iter()
            .find(|f| {
                f.name() == name
                    && f.is_crosslinked() == crosslinked
                    && f.spans()[0].peptide == peptide.id()
            })
            .cloned()
            .unwrap()
    };
    // linear b2 and b3 of PEPTIDEK, y3 (KER) of KLINKER covering its second
    // lysine, and y2 of PEPTIDEK carrying the whole of KLINKER
    let evidence = vec![
        pick("b2", p1, false),
        pick("b3", p1, false),
        pick("y3", p2, false),
        pick("y2+P1", p1, true),
    ];
    let m = builder
        .build(spectrum_of(&evidence), p1.clone(), Some(p2.clone()))
        .unwrap();
    (m, linker)
}

#[test]
fn test_peptidek_klinker() {
    let (mut m, linker) = peptidek_klinker_match();
    assert_eq!(m.spectrum.annotation_count(), 4);
    let res = SiteResolver::new(&linker).resolve(&mut m);
    assert_eq!(res.sites.site1, Some(7));
    assert_eq!(res.sites.site2, Some(0));
    assert_eq!(res.retracted, 0);
    assert_eq!(m.spectrum.annotation_count(), 4);
}

#[test]
fn test_forced_resolution_on_other_lysine() {
    let (mut m, linker) = peptidek_klinker_match();
    let res = SiteResolver::new(&linker).resolve_forced(&mut m, 7, Some(4));
    assert_eq!(res.sites, LinkSites::pair(7, 4));
    // only y3 of KLINKER sits on K4
    assert_eq!(res.retracted, 1);
    assert_eq!(m.spectrum.annotation_count(), 3);
    assert_eq!(m.fragments.annotation_count(), 3);
}

#[test]
fn test_lysine_preferred_over_serine_on_tie() {
    let peptides = table(&["ASKR", "KGGR"]);
    let (p1, p2) = (&peptides.as_slice()[0], &peptides.as_slice()[1]);
    let catalog = Catalog::default();
    let scheme = scheme();
    let linker = ResidueRestrictedCrossLinker::new(
        "amine",
        LINKER_MASS,
        &[('K', 0.0), ('S', 0.0), ('T', 0.0), ('Y', 0.0)],
    );
    assert!(linker.can_link(p1, 1) && linker.can_link(p1, 2));
    let builder = MatchBuilder {
        scheme: &scheme,
        catalog: &catalog,
        linker: &linker,
        matcher: FragmentMatcher::new(ToleranceUnit::Ppm(5.0)),
    };
    // the precursor pair only: no fragment tells S1 and K2 apart
    let theoretical = builder.theoretical_fragments(p1, Some(p2)).unwrap();
    let whole: Vec<Arc<Fragment>> = theoretical
        .iter()
        .filter(|f| f.is_crosslinked() && f.fragmentation_sites() == 0)
        .cloned()
        .collect();
    assert_eq!(whole.len(), 1);
    let mut m = builder
        .build(spectrum_of(&whole), p1.clone(), Some(p2.clone()))
        .unwrap();
    let res = SiteResolver::new(&linker).resolve(&mut m);
    assert_eq!(res.sites, LinkSites::pair(2, 0));
    assert_eq!(res.retracted, 0);
}

#[test]
fn test_batch_resolution_and_stop() {
    let make = || {
        let (m, _) = peptidek_klinker_match();
        m
    };
    let linker = lysine_linker();
    let resolver = SiteResolver::new(&linker);

    let mut matches: Vec<SpectrumMatch> = (0..8).map(|_| make()).collect();
    let outcome = resolve_all(&mut matches, &resolver, ResolutionMode::Plain, &StopFlag::new());
    println!("{}", outcome);
    assert_eq!(outcome.resolved, 8);
    assert_eq!(outcome.unsupported, 0);
    assert!(!outcome.cancelled);
    assert!(matches.iter().all(|m| m.sites == LinkSites::pair(7, 0)));

    let mut matches: Vec<SpectrumMatch> = (0..4).map(|_| make()).collect();
    let outcome = resolve_all(&mut matches, &resolver, ResolutionMode::Weighted, &StopFlag::new());
    assert_eq!(outcome.resolved, 4);
    for m in matches.iter() {
        let conf = m.confidence.as_ref().unwrap();
        assert!(conf.of(m.sites) > 0.5);
    }

    let stop = StopFlag::new();
    stop.request_stop();
    let mut matches: Vec<SpectrumMatch> = (0..4).map(|_| make()).collect();
    let outcome = resolve_all(&mut matches, &resolver, ResolutionMode::Plain, &stop);
    assert!(outcome.cancelled);
    assert_eq!(outcome.resolved, 0);
    assert!(matches.iter().all(|m| !m.sites.is_supported()));
}

#[test]
fn test_alpha_candidates_from_index() {
    let peptides = Arc::new(table(&["PEPTIDEK", "KLINKER", "SAMPLER", "GGGR"]));
    let scheme = Arc::new(scheme());
    let catalog = Arc::new(Catalog::default());
    let (index, stats) = IndexBuilder::new(peptides.clone(), catalog.clone(), scheme.clone())
        .with_tolerance(ToleranceUnit::Ppm(10.0))
        .build()
        .unwrap();
    println!("{}", stats);

    let target = &peptides.as_slice()[2];
    let fragments = scheme.shared_fragments(target, &catalog).unwrap();
    let spectrum = spectrum_of(&fragments[..6]);
    let options = CandidateOptions {
        mass_ceiling: Some(5000.0),
        ..Default::default()
    };
    let found = alpha_candidates(&index, &spectrum, &scheme, &catalog, &options).unwrap();
    assert!(!found.is_empty());
    assert_eq!(found[0].peptide.sequence(), "SAMPLER");
    assert_eq!(found[0].matched_peaks, 6);

    // a ceiling below every peptide leaves nothing
    let options = CandidateOptions {
        mass_ceiling: Some(100.0),
        ..Default::default()
    };
    let found = alpha_candidates(&index, &spectrum, &scheme, &catalog, &options).unwrap();
    assert!(found.is_empty());
}
