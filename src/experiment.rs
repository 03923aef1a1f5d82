//! One simulated fMRI experiment and its registry of models.
//!
//! An [`Experiment`] owns a trial sequence, the per-trial behavioral data
//! and a PRNG stream. [`Experiment::run`] builds every registered model in
//! order: design matrix, synthetic BOLD, normalization, GLM fit. It then
//! returns one [`Record`] holding the run metadata plus a group per model.

use std::collections::BTreeMap;
use std::fmt;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bold;
use crate::config::ExperimentConfig;
use crate::design::{DesignBuilder, DesignKind, DesignMatrix};
use crate::error::{Result, SimError};
use crate::glm::Glm;
use crate::hrf::{perturb, HrfKernel};
use crate::norm::Normalization;
use crate::record::{insert_fit, Mapping, Record, Value};
use crate::timing::{dtime, isi_expand, isi_multiplier};
use crate::types::{Condition, Matrix, Prng};

/// Where the simulated BOLD signal comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoldSource {
    /// Sum of named design-matrix columns (e.g. `box_1`).
    Columns(Vec<String>),
    /// Sum of named per-trial data arrays, expanded to TR resolution.
    Data(Vec<String>),
}

impl BoldSource {
    /// Names this source reads from.
    pub fn names(&self) -> &[String] {
        match self {
            BoldSource::Columns(n) | BoldSource::Data(n) => n,
        }
    }
}

fn yes() -> bool {
    true
}

/// A named regression model: which design to build and what the BOLD is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Unique model name, used as the record key.
    pub name: String,
    /// Design-matrix constructor.
    pub design: DesignKind,
    /// BOLD signal source.
    pub bold: BoldSource,
    /// Convolve the BOLD regressors with the HRF before adding noise.
    #[serde(default)]
    pub bold_convolve: bool,
    /// Sub-trial positions to leave out of the design.
    #[serde(default)]
    pub drop: Option<Vec<bool>>,
    /// Convolve the design with the HRF.
    #[serde(default = "yes")]
    pub convolve: bool,
    /// Normalization of BOLD and design before fitting.
    #[serde(default)]
    pub norm: Normalization,
}

impl ModelSpec {
    /// Boxcar model whose BOLD is the sum of `bold_columns`.
    pub fn boxcar<S: Into<String>>(name: impl Into<String>, bold_columns: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            name,
            DesignKind::Boxcar,
            BoldSource::Columns(bold_columns.into_iter().map(Into::into).collect()),
        )
    }

    /// Parametric model on `regressors` whose BOLD is the sum of `bold_data`.
    pub fn parametric<S: Into<String>, T: Into<String>>(
        name: impl Into<String>,
        regressors: impl IntoIterator<Item = S>,
        bold_data: impl IntoIterator<Item = T>,
    ) -> Self {
        Self::new(
            name,
            DesignKind::Parametric {
                names: regressors.into_iter().map(Into::into).collect(),
                with_box: false,
                orth: false,
            },
            BoldSource::Data(bold_data.into_iter().map(Into::into).collect()),
        )
    }

    fn new(name: impl Into<String>, design: DesignKind, bold: BoldSource) -> Self {
        Self {
            name: name.into(),
            design,
            bold,
            bold_convolve: false,
            drop: None,
            convolve: true,
            norm: Normalization::default(),
        }
    }

    /// Prepend the boxcar block to a parametric design.
    pub fn with_box(mut self) -> Self {
        if let DesignKind::Parametric { with_box, .. } = &mut self.design {
            *with_box = true;
        }
        self
    }

    /// Orthogonalize a parametric design.
    pub fn orth(mut self) -> Self {
        if let DesignKind::Parametric { orth, .. } = &mut self.design {
            *orth = true;
        }
        self
    }

    /// Drop sub-trial positions from the design.
    pub fn drop_mask(mut self, mask: Vec<bool>) -> Self {
        self.drop = Some(mask);
        self
    }

    /// Choose whether the design is convolved.
    pub fn convolve(mut self, convolve: bool) -> Self {
        self.convolve = convolve;
        self
    }

    /// Choose whether the BOLD regressors are convolved.
    pub fn bold_convolve(mut self, convolve: bool) -> Self {
        self.bold_convolve = convolve;
        self
    }

    /// Set the normalization.
    pub fn norm(mut self, norm: Normalization) -> Self {
        self.norm = norm;
        self
    }

    /// Parse an ordered list of models from JSON.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for ModelSpec {
    /// One-line description: name, BOLD sources and design columns.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dm = vec!["baseline".to_string()];
        match &self.design {
            DesignKind::Boxcar => dm.push("box".into()),
            DesignKind::Parametric { names, with_box, orth } => {
                if *with_box {
                    dm.push("box".into());
                }
                dm.extend(names.iter().cloned());
                if *orth {
                    dm.push("(orth)".into());
                }
            }
        }
        write!(f, "{}. Bold: {:?}. DM: {:?}.", self.name, self.bold.names(), dm)
    }
}

/// Random order of `per_cond` trials for each condition `1..=nconds`.
///
/// With `jitter`, `per_cond` baseline trials are shuffled in as well.
pub fn random_trials(nconds: Condition, per_cond: usize, jitter: bool, mut prng: Prng) -> (Vec<Condition>, Prng) {
    let first = if jitter { 0 } else { 1 };
    let mut trials: Vec<Condition> = (first..=nconds)
        .flat_map(|c| std::iter::repeat(c).take(per_cond))
        .collect();
    trials.shuffle(&mut prng);
    (trials, prng)
}

/// A single simulated experiment.
#[derive(Debug, Clone)]
pub struct Experiment {
    config: ExperimentConfig,
    mult: usize,
    ntrials: usize,
    trials: Vec<Condition>,
    durations: Vec<usize>,
    data: BTreeMap<String, Vec<f64>>,
    models: Vec<ModelSpec>,
    prng: Prng,
}

impl Experiment {
    /// Experiment over `trials` with per-trial `durations` in TR units.
    ///
    /// When the configured ISI is a multiple of the TR, every trial is
    /// followed by `ISI/TR − 1` single-TR baseline trials.
    pub fn new(trials: Vec<Condition>, durations: Vec<usize>, config: ExperimentConfig, prng: Prng) -> Result<Self> {
        if trials.len() != durations.len() {
            return Err(SimError::length("durations", trials.len(), durations.len()));
        }
        let mult = match config.isi {
            Some(isi) => isi_multiplier(config.tr, isi)?,
            None => 1,
        };
        let ntrials = trials.len();

        let trials = isi_expand(&trials, mult, 0);
        let durations = isi_expand(&durations, mult, 1);
        debug!(ntrials, mult, rows = durations.iter().sum::<usize>(), "created experiment");

        Ok(Self {
            config,
            mult,
            ntrials,
            trials,
            durations,
            data: BTreeMap::new(),
            models: Vec::new(),
            prng,
        })
    }

    /// Experiment where every trial lasts one TR.
    pub fn with_unit_durations(trials: Vec<Condition>, config: ExperimentConfig, prng: Prng) -> Result<Self> {
        let durations = vec![1; trials.len()];
        Self::new(trials, durations, config, prng)
    }

    /// Attach a named per-trial data array (one value per original trial).
    pub fn add_data(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.ntrials {
            return Err(SimError::length(name, self.ntrials, values.len()));
        }
        self.data.insert(name, isi_expand(&values, self.mult, 0.0));
        Ok(())
    }

    /// Builder form of [`add_data`](Self::add_data).
    pub fn data(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.add_data(name, values)?;
        Ok(self)
    }

    /// Register a model. Names must be unique.
    pub fn add_model(&mut self, spec: ModelSpec) -> Result<()> {
        if self.models.iter().any(|m| m.name == spec.name) {
            return Err(SimError::invalid("model", format!("`{}` is already registered", spec.name)));
        }
        self.models.push(spec);
        Ok(())
    }

    /// Builder form of [`add_model`](Self::add_model).
    pub fn model(mut self, spec: ModelSpec) -> Result<Self> {
        self.add_model(spec)?;
        Ok(self)
    }

    /// Register every model of a JSON list, in order.
    pub fn populate_models(&mut self, json: &str) -> Result<()> {
        for spec in ModelSpec::list_from_json(json)? {
            self.add_model(spec)?;
        }
        Ok(())
    }

    /// Registered models in run order.
    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    /// One description line per registered model.
    pub fn model_docs(&self) -> Vec<String> {
        self.models
            .iter()
            .enumerate()
            .map(|(i, m)| format!("{}. {m}", i + 1))
            .collect()
    }

    /// Trials at TR resolution (after ISI padding).
    pub fn trials(&self) -> &[Condition] {
        &self.trials
    }

    /// Durations matching [`trials`](Self::trials).
    pub fn durations(&self) -> &[usize] {
        &self.durations
    }

    /// Attached data arrays after ISI padding.
    pub fn data_arrays(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.data
    }

    /// Run every model in order under batch `code`.
    ///
    /// Returns the record and the advanced PRNG.
    pub fn run(mut self, code: usize) -> Result<(Record, Prng)> {
        let mut record = Record::new();
        record.insert("batch_code", code);
        record.insert("TR", self.config.tr);
        record.insert("ISI", self.config.isi);
        record.insert("trials", self.trials.iter().map(|&t| t as f64).collect::<Vec<_>>());
        record.insert("durations", self.durations.iter().map(|&d| d as f64).collect::<Vec<_>>());
        record.insert(
            "data",
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                .collect::<Mapping>(),
        );

        let (hrf, hrf_meta) = self.resolve_hrf()?;
        record.insert("hrf", hrf_meta);

        let models = std::mem::take(&mut self.models);
        for spec in &models {
            info!("Fitting {}", spec.name);
            let group = self.fit_model(spec, &hrf)?;
            record.insert(spec.name.clone(), group);
        }

        Ok((record, self.prng))
    }

    // The kernel is sampled at the experiment TR, whatever `hrf.tr` says.
    fn resolve_hrf(&mut self) -> Result<(HrfKernel, Mapping)> {
        let base = self.config.hrf.with_sampling(self.config.hrf.width, self.config.tr);
        let (kernel, params, perturbed) = match self.config.hrf_perturbation {
            Some(fraction) => {
                let (p, prng) = perturb(base, fraction, self.prng.clone())?;
                self.prng = prng;
                debug!(parameter = ?p.perturbed, "perturbed HRF");
                (p.kernel, p.params, Value::from(format!("{:?}", p.perturbed).to_lowercase()))
            }
            None => (HrfKernel::try_from(base)?, base, Value::Null),
        };

        let mut meta = Mapping::new();
        for (key, value) in [
            ("a1", params.a1),
            ("a2", params.a2),
            ("b1", params.b1),
            ("b2", params.b2),
            ("c", params.c),
            ("width", params.width),
            ("tr", params.tr),
        ] {
            meta.insert(key.to_string(), value.into());
        }
        meta.insert("perturbed".to_string(), perturbed);
        Ok((kernel, meta))
    }

    fn design(&self, spec: &ModelSpec, hrf: &HrfKernel) -> Result<DesignMatrix> {
        let builder = DesignBuilder::new(&self.trials, &self.durations)
            .maybe_drop_mask(spec.drop.as_deref())
            .maybe_convolve(spec.convolve.then_some(hrf));

        match &spec.design {
            DesignKind::Boxcar => builder.boxcar(),
            DesignKind::Parametric { names, with_box, orth } => {
                let regressors = names
                    .iter()
                    .map(|n| Ok((n.as_str(), self.lookup(spec, n)?)))
                    .collect::<Result<Vec<(&str, &[f64])>>>()?;
                builder.parametric(&regressors, *with_box, *orth)
            }
        }
    }

    fn lookup(&self, spec: &ModelSpec, name: &str) -> Result<&[f64]> {
        self.data
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| SimError::MissingData {
                model: spec.name.clone(),
                name: name.to_string(),
            })
    }

    fn bold(&mut self, spec: &ModelSpec, dm: &DesignMatrix, hrf: &HrfKernel) -> Result<Vec<f64>> {
        let columns = match &spec.bold {
            BoldSource::Columns(names) => {
                let idx = names
                    .iter()
                    .map(|n| {
                        dm.column_index(n).ok_or_else(|| SimError::MissingData {
                            model: spec.name.clone(),
                            name: n.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                dm.select(&idx)
            }
            BoldSource::Data(names) => {
                let mut expanded = Vec::with_capacity(names.len());
                for n in names {
                    let values = self.lookup(spec, n)?;
                    expanded.push(dtime(values, &self.durations, spec.drop.as_deref(), 0.0)?);
                }
                let rows = dm.nrows();
                Matrix::from_fn(rows, expanded.len(), |r, c| expanded[c][r])
            }
        };

        let hrf = spec.bold_convolve.then_some(hrf);
        let noise = self.config.noise.clone().with_tr(self.config.tr);
        let (signal, prng) = bold::synthesize(&columns, &noise, hrf, self.prng.clone())?;
        self.prng = prng;
        Ok(signal)
    }

    fn fit_model(&mut self, spec: &ModelSpec, hrf: &HrfKernel) -> Result<Mapping> {
        let dm = self.design(spec, hrf)?;
        let signal = self.bold(spec, &dm, hrf)?;

        let y = spec.norm.apply_signal(&signal);
        let x = spec.norm.apply_matrix(dm.matrix());
        let mut glm = Glm::new();
        let fit = glm.fit(&y, &x)?;

        let mut group = Mapping::new();
        group.insert("dm".into(), dm.matrix().into());
        group.insert("bold".into(), signal.into());
        insert_fit(&mut group, fit);

        let mut meta = Mapping::new();
        meta.insert("dm".into(), dm.names().to_vec().into());
        meta.insert("bold".into(), spec.bold.names().to_vec().into());
        meta.insert("doc".into(), spec.to_string().into());
        group.insert("meta".into(), meta.into());
        Ok(group)
    }
}
