use crate::errors::{
    Result,
    XlseekError,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use xlquery::Fragment;
use xlquery::models::chemistry::PROTON_MASS;
use xlquery::utils::{
    TupleRange,
    binary_search_range_by_key,
};

/// A theoretical fragment explaining a peak at a given charge.
#[derive(Debug, Clone)]
pub struct PeakAnnotation {
    pub fragment: Arc<Fragment>,
    pub charge: u8,
    /// Intensity summed over the isotope cluster, when one was resolved.
    pub cluster_intensity: Option<f64>,
}

impl PeakAnnotation {
    pub fn is(&self, fragment: &Fragment, charge: u8) -> bool {
        self.charge == charge && self.fragment.as_ref() == fragment
    }
}

#[derive(Debug, Clone)]
pub struct SpectrumPeak {
    pub mz: f64,
    pub intensity: f64,
    pub cluster_intensity: Option<f64>,
    pub annotations: Vec<PeakAnnotation>,
}

impl SpectrumPeak {
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self {
            mz,
            intensity,
            cluster_intensity: None,
            annotations: Vec::new(),
        }
    }

    /// Intensity an annotation contributes as evidence.
    ///
    /// The cluster intensity of the annotation wins, then the one of the
    /// peak, then the raw peak intensity.
    pub fn evidence(&self, annotation: &PeakAnnotation) -> f64 {
        annotation
            .cluster_intensity
            .or(self.cluster_intensity)
            .unwrap_or(self.intensity)
    }

    /// Removes the annotation of `fragment` at `charge`; true if one was present.
    pub fn delete_annotation(&mut self, fragment: &Fragment, charge: u8) -> bool {
        let before = self.annotations.len();
        self.annotations.retain(|a| !a.is(fragment, charge));
        before != self.annotations.len()
    }

    pub fn is_annotated(&self) -> bool {
        !self.annotations.is_empty()
    }
}

/// A fragmentation spectrum with peaks sorted by m/z.
#[derive(Debug, Clone)]
pub struct Spectrum {
    pub id: String,
    pub precursor_mz: f64,
    pub precursor_charge: u8,
    peaks: Vec<SpectrumPeak>,
}

impl Spectrum {
    pub fn try_new(
        id: impl Into<String>,
        precursor_mz: f64,
        precursor_charge: u8,
        mut peaks: Vec<SpectrumPeak>,
    ) -> Result<Self> {
        let id = id.into();
        if precursor_charge == 0 {
            return Err(XlseekError::InvalidSpectrum {
                id,
                msg: "precursor charge must be at least 1".into(),
            });
        }
        if !precursor_mz.is_finite() || peaks.iter().any(|p| !p.mz.is_finite()) {
            return Err(XlseekError::InvalidSpectrum {
                id,
                msg: "non finite m/z".into(),
            });
        }
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        Ok(Self {
            id,
            precursor_mz,
            precursor_charge,
            peaks,
        })
    }

    pub fn peaks(&self) -> &[SpectrumPeak] {
        &self.peaks
    }

    pub fn peaks_mut(&mut self) -> &mut [SpectrumPeak] {
        &mut self.peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn max_intensity(&self) -> f64 {
        self.peaks.iter().map(|p| p.intensity).fold(0.0, f64::max)
    }

    /// Neutral mass of the precursor.
    pub fn precursor_mass(&self) -> f64 {
        (self.precursor_mz - PROTON_MASS) * f64::from(self.precursor_charge)
    }

    /// Indices of the peaks whose m/z falls inside `window`.
    pub fn peak_range(&self, window: TupleRange<f64>) -> std::ops::Range<usize> {
        binary_search_range_by_key(&self.peaks, window.as_inclusive_range(), |p| p.mz)
    }

    pub fn annotation_count(&self) -> usize {
        self.peaks.iter().map(|p| p.annotations.len()).sum()
    }

    pub fn clear_annotations(&mut self) {
        for peak in self.peaks.iter_mut() {
            peak.annotations.clear();
        }
    }
}

/// On-disk shape of a spectrum: peaks as `[mz, intensity]` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumRecord {
    pub id: String,
    pub precursor_mz: f64,
    pub precursor_charge: u8,
    pub peaks: Vec<[f64; 2]>,
}

impl TryFrom<SpectrumRecord> for Spectrum {
    type Error = XlseekError;

    fn try_from(value: SpectrumRecord) -> Result<Self> {
        let peaks = value
            .peaks
            .into_iter()
            .map(|[mz, intensity]| SpectrumPeak::new(mz, intensity))
            .collect();
        Spectrum::try_new(value.id, value.precursor_mz, value.precursor_charge, peaks)
    }
}

/// Reads a JSON array of [`SpectrumRecord`]s.
pub fn read_spectra(path: &Path) -> Result<Vec<Spectrum>> {
    let content = std::fs::read_to_string(path).map_err(|e| XlseekError::Io {
        source: e,
        path: Some(path.to_path_buf()),
    })?;
    let records: Vec<SpectrumRecord> = serde_json::from_str(&content)?;
    debug!("Read {} spectra from {}", records.len(), path.display());
    records.into_iter().map(Spectrum::try_from).collect()
}
