use crate::config::{
    Config,
    IndexStorage,
    ModificationConfig,
};
use crate::errors::CliError;
use crate::progress::{
    ProgressStatus,
    bar_style,
};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{
    Path,
    PathBuf,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{
    debug,
    info,
    warn,
};
use xlquery::fragmentation::{
    FragmentationScheme,
    GeneratorRegistry,
};
use xlquery::{
    Catalog,
    FragmentLookup,
    IndexBuildStats,
    IndexBuilder,
    ModificationEnumerator,
    Peptide,
    PeptideTable,
    SequenceOrigin,
    StatusMultiplex,
    StopFlag,
    XlqueryError,
};
use xlseek::models::read_spectra;
use xlseek::{
    FragmentMatcher,
    MatchBuilder,
    SiteResolver,
    Spectrum,
    SpectrumMatch,
    XlseekError,
    alpha_candidates,
    resolve_all,
};

/// One entry of the peptide list.
#[derive(Debug, Clone, Deserialize)]
pub struct PeptideRecord {
    pub sequence: String,
    pub protein: Option<String>,
    #[serde(default)]
    pub offset: usize,
    pub protein_length: Option<usize>,
}

/// A peptide pair to localise, peptides given by descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchRecord {
    pub spectrum: String,
    pub peptide1: String,
    pub peptide2: Option<String>,
}

#[derive(Debug, Serialize)]
struct CandidateRow<'a> {
    spectrum: &'a str,
    rank: usize,
    peptide: String,
    matched_peaks: usize,
    fragment_count: usize,
    score: f64,
}

#[derive(Debug, Serialize)]
struct ResolutionRow<'a> {
    spectrum: &'a str,
    peptide1: String,
    peptide2: Option<String>,
    site1: Option<usize>,
    site2: Option<usize>,
    annotated_peaks: usize,
    explained_intensity: f64,
    confidence: Option<f64>,
}

/// Shared read-only state of a run.
pub struct Workspace {
    pub catalog: Arc<Catalog>,
    pub scheme: Arc<FragmentationScheme>,
    pub peptides: Arc<PeptideTable>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let file = File::open(path).map_err(|e| CliError::io(e, path))?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<(), CliError> {
    let file = File::create(path).map_err(|e| CliError::io(e, path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), data)?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn apply_fixed(peptide: Peptide, mods: &ModificationConfig) -> Result<Peptide, XlqueryError> {
    let mut out = peptide;
    for position in 0..out.len() {
        let residue = out.residue_at(position);
        if let Some(m) = mods.fixed.iter().find(|m| Some(m.residue) == residue) {
            out = out.with_modification(position, m.clone())?;
        }
    }
    Ok(out)
}

/// Reads the peptide list, merges repeated sequences and expands the
/// variable modifications.
pub fn load_peptides(
    path: &Path,
    catalog: &Catalog,
    mods: &ModificationConfig,
) -> Result<PeptideTable, CliError> {
    let records: Vec<PeptideRecord> = read_json(path)?;
    let mut bases: Vec<Peptide> = Vec::with_capacity(records.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for record in records {
        let mut peptide = Peptide::try_new(&record.sequence, catalog).map_err(XlqueryError::from)?;
        if let Some(protein) = record.protein {
            peptide = peptide.with_origin(SequenceOrigin {
                protein: protein.into(),
                offset: record.offset,
                protein_length: record
                    .protein_length
                    .unwrap_or(record.offset + record.sequence.len()),
            });
        }
        match seen.get(&record.sequence) {
            Some(&i) => {
                if let Some(origin) = peptide.origins().first() {
                    bases[i] = bases[i].clone().with_origin(origin.clone());
                }
            }
            None => {
                seen.insert(record.sequence, bases.len());
                bases.push(peptide);
            }
        }
    }

    let mut out = Vec::with_capacity(bases.len());
    for base in bases {
        let base = apply_fixed(base, mods)?;
        out.extend(ModificationEnumerator::new(
            &base,
            &mods.variable,
            mods.max_per_peptide,
            mods.max_variants,
        ));
    }
    info!(
        "Loaded {} peptides ({} sequences) from {}",
        out.len(),
        seen.len(),
        path.display()
    );
    Ok(PeptideTable::new(out))
}

impl Workspace {
    pub fn load(config: &Config, peptides: &Path) -> Result<Self, CliError> {
        let mods = &config.modifications;
        let catalog = Catalog::with_modifications(
            mods.fixed.iter().chain(mods.variable.iter()).cloned(),
        );
        let scheme = GeneratorRegistry::with_defaults().resolve(&config.fragmentation)?;
        let peptides = load_peptides(peptides, &catalog, mods)?;
        Ok(Self {
            catalog: Arc::new(catalog),
            scheme: Arc::new(scheme),
            peptides: Arc::new(peptides),
        })
    }

    pub fn build_index(
        &self,
        config: &Config,
    ) -> Result<(Box<dyn FragmentLookup>, IndexBuildStats), CliError> {
        let status = StatusMultiplex::new().with_sink(Arc::new(ProgressStatus::new()));
        let builder =
            IndexBuilder::new(self.peptides.clone(), self.catalog.clone(), self.scheme.clone())
                .with_tolerance(config.index.tolerance)
                .with_options(config.index.build.clone())
                .with_status(status);
        let (index, stats): (Box<dyn FragmentLookup>, IndexBuildStats) =
            match &config.index.storage {
                IndexStorage::InMemory => {
                    let (index, stats) = builder.build()?;
                    (Box::new(index) as Box<dyn FragmentLookup>, stats)
                }
                IndexStorage::Disk { path, lookahead } => {
                    let (mut index, stats) = builder.build_on_disk(path.clone())?;
                    if let Some(x) = lookahead {
                        index = index.with_lookahead(*x);
                    }
                    info!("{}", index);
                    (Box::new(index) as Box<dyn FragmentLookup>, stats)
                }
            };
        info!("{}", stats);
        Ok((index, stats))
    }
}

pub fn build(config: &Config, peptides: &Path, output: &Path) -> Result<(), CliError> {
    let ws = Workspace::load(config, peptides)?;
    let (index, _stats) = ws.build_index(config)?;
    info!(
        "Index holds {} fragments of {} peptides",
        index.fragment_count()?,
        index.peptides().len()
    );
    if config.output.as_ref().is_some_and(|o| o.dump_index) {
        let path = output.join("index_dump.txt");
        let file = File::create(&path).map_err(|e| CliError::io(e, &path))?;
        index.dump(&mut BufWriter::new(file))?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn load_spectra(path: Option<&PathBuf>) -> Result<Vec<Spectrum>, CliError> {
    let Some(path) = path else {
        return Err(CliError::Config {
            source: "No spectra provided, please provide them in either the config file or with the --spectra flag".to_string(),
        });
    };
    let spectra = read_spectra(path)?;
    info!("Loaded {} spectra from {}", spectra.len(), path.display());
    Ok(spectra)
}

pub fn candidates(
    config: &Config,
    peptides: &Path,
    spectra: Option<&PathBuf>,
    output: &Path,
) -> Result<(), CliError> {
    let spectra = load_spectra(spectra)?;
    let ws = Workspace::load(config, peptides)?;
    let (index, _stats) = ws.build_index(config)?;
    let options = &config.search.candidates;

    let start = Instant::now();
    let found: Vec<Vec<CandidateRow>> = spectra
        .par_iter()
        .progress_with_style(bar_style())
        .map(|spectrum| -> Result<Vec<CandidateRow>, XlseekError> {
            let found =
                alpha_candidates(index.as_ref(), spectrum, &ws.scheme, &ws.catalog, options)?;
            debug!("{}: {} candidates", spectrum.id, found.len());
            Ok(found
                .into_iter()
                .enumerate()
                .map(|(rank, c)| CandidateRow {
                    spectrum: &spectrum.id,
                    rank,
                    peptide: c.peptide.descriptor(),
                    matched_peaks: c.matched_peaks,
                    fragment_count: c.fragment_count,
                    score: c.score,
                })
                .collect())
        })
        .collect::<Result<_, XlseekError>>()?;
    let with_hits = found.iter().filter(|x| !x.is_empty()).count();
    info!(
        "{} of {} spectra have candidates ({:?})",
        with_hits,
        spectra.len(),
        start.elapsed()
    );
    let rows: Vec<CandidateRow> = found.into_iter().flatten().collect();
    write_json(&output.join("candidates.json"), &rows)
}

fn lookup<'a>(table: &'a PeptideTable, descriptor: &str) -> Result<&'a Peptide, XlseekError> {
    table
        .find_by_descriptor(descriptor)
        .ok_or_else(|| XlseekError::PeptideNotFound {
            descriptor: descriptor.to_string(),
        })
}

pub fn resolve(
    config: &Config,
    peptides: &Path,
    spectra: Option<&PathBuf>,
    output: &Path,
) -> Result<(), CliError> {
    let Some(matches_path) = config.input.as_ref().and_then(|x| x.matches()) else {
        return Err(CliError::Config {
            source: "No peptide pairs provided, please set `matches` in the input config"
                .to_string(),
        });
    };
    let records: Vec<MatchRecord> = read_json(matches_path)?;
    let spectra = load_spectra(spectra)?;
    let ws = Workspace::load(config, peptides)?;
    let by_id: HashMap<&str, &Spectrum> = spectra.iter().map(|s| (s.id.as_str(), s)).collect();

    let linker = config.crosslinker.linker();
    let builder = MatchBuilder {
        scheme: &ws.scheme,
        catalog: &ws.catalog,
        linker,
        matcher: FragmentMatcher::new(config.search.fragment_tolerance),
    };
    let built: Vec<Option<SpectrumMatch>> = records
        .par_iter()
        .map(|record| -> Result<Option<SpectrumMatch>, XlseekError> {
            let Some(spectrum) = by_id.get(record.spectrum.as_str()) else {
                warn!("Spectrum {} not found, skipping", record.spectrum);
                return Ok(None);
            };
            let p1 = lookup(&ws.peptides, &record.peptide1)?;
            let p2 = record
                .peptide2
                .as_deref()
                .map(|d| lookup(&ws.peptides, d))
                .transpose()?;
            let m = builder.build((*spectrum).clone(), p1.clone(), p2.cloned())?;
            Ok(Some(m))
        })
        .collect::<Result<_, XlseekError>>()?;
    let mut matches: Vec<SpectrumMatch> = built.into_iter().flatten().collect();

    let resolver = SiteResolver::new(linker);
    let outcome = resolve_all(&mut matches, &resolver, config.search.mode, &StopFlag::new());
    println!("{}", outcome);

    let mut rows = Vec::with_capacity(matches.len());
    for m in matches.iter() {
        println!("{}\t{}", m.spectrum.id, m.label());
        rows.push(ResolutionRow {
            spectrum: &m.spectrum.id,
            peptide1: m.peptide1.descriptor(),
            peptide2: m.peptide2.as_ref().map(|p| p.descriptor()),
            site1: m.sites.site1,
            site2: m.sites.site2,
            annotated_peaks: m.annotated_peaks(),
            explained_intensity: m.explained_intensity(),
            confidence: m.confidence.as_ref().map(|c| c.of(m.sites)),
        });
    }
    write_json(&output.join("resolutions.json"), &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlquery::Modification;

    fn write_tmp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("xlseek_cli_{}_{}", std::process::id(), name));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_peptides_merges_and_expands() {
        let path = write_tmp(
            "peptides.json",
            r#"[
                {"sequence": "PMCK", "protein": "P1", "offset": 0, "protein_length": 40},
                {"sequence": "PMCK", "protein": "P2", "offset": 10, "protein_length": 20},
                {"sequence": "GGR"}
            ]"#,
        );
        let mods = ModificationConfig {
            fixed: vec![Modification {
                name: "cam".into(),
                residue: 'C',
                delta_mass: 57.021_464,
            }],
            variable: vec![Modification {
                name: "ox".into(),
                residue: 'M',
                delta_mass: 15.994_915,
            }],
            ..Default::default()
        };
        let catalog =
            Catalog::with_modifications(mods.fixed.iter().chain(mods.variable.iter()).cloned());
        let table = load_peptides(&path, &catalog, &mods).unwrap();
        let descriptors: Vec<String> = table.iter().map(|p| p.descriptor()).collect();
        println!("{:?}", descriptors);
        assert_eq!(table.as_slice().len(), 3);
        let plain = table.find_by_descriptor("PMC[cam]K").unwrap();
        assert_eq!(plain.origins().len(), 2);
        assert!(plain.is_protein_n_term());
        assert!(table.find_by_descriptor("PM[ox]C[cam]K").is_some());
        assert!(table.find_by_descriptor("GGR").unwrap().origins().is_empty());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_unknown_residue_is_reported() {
        let path = write_tmp("bad_peptides.json", r#"[{"sequence": "PEPXIDE"}]"#);
        let out = load_peptides(&path, &Catalog::default(), &ModificationConfig::default());
        assert!(matches!(out, Err(CliError::Search { .. })));
        std::fs::remove_file(path).unwrap();
    }

    fn build_with_storage(dir: &Path, peptides: &Path, storage: &str) -> String {
        let config: Config = serde_json::from_str(&format!(
            r#"{{
                "index": {{
                    "storage": {storage},
                    "tolerance": {{"ppm": 10.0}},
                    "build": {{"shard_count": 2}}
                }},
                "output": {{"directory": "{}", "dump_index": true}}
            }}"#,
            dir.display()
        ))
        .unwrap();
        std::fs::create_dir_all(dir).unwrap();
        build(&config, peptides, dir).unwrap();
        std::fs::read_to_string(dir.join("index_dump.txt")).unwrap()
    }

    #[test]
    fn test_disk_build_dump_matches_memory() {
        let root = std::env::temp_dir().join(format!("xlseek_cli_{}_disk", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        let peptides = root.join("peptides.json");
        std::fs::write(
            &peptides,
            r#"[
                {"sequence": "PEPTIDEK"},
                {"sequence": "KLINKER"},
                {"sequence": "SAMPLER"},
                {"sequence": "GGGR"}
            ]"#,
        )
        .unwrap();
        let sqlite = root.join("index.sqlite");

        let memory = build_with_storage(&root.join("memory"), &peptides, r#"{"type": "memory"}"#);
        let disk = build_with_storage(
            &root.join("disk"),
            &peptides,
            &format!(
                r#"{{"type": "disk", "path": "{}", "lookahead": 30.0}}"#,
                sqlite.display()
            ),
        );
        println!("{}", disk);
        assert!(!memory.is_empty());
        assert_eq!(memory, disk);
        assert!(sqlite.exists());
        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_missing_peptide_descriptor() {
        let table: PeptideTable = vec![Peptide::try_new("GGR", &Catalog::default()).unwrap()]
            .into_iter()
            .collect();
        assert!(lookup(&table, "GGR").is_ok());
        assert!(matches!(
            lookup(&table, "KLINKER"),
            Err(XlseekError::PeptideNotFound { .. })
        ));
    }
}
