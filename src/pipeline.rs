//! Request pipeline.
//!
//! Composes slot generation, scheduling, repair, and validation into the two
//! request paths. Every stage is a pure function of its inputs; the pipeline
//! holds only configuration, so one instance can serve concurrent callers.
//!
//! ```text
//! generate: Received → Slotting → Assigning → Validating → Satisfied | Violated
//! refine:   Received → Repairing → [Assigning] → Validating → Satisfied | Violated
//! ```
//! `Assigning` appears on the refine path only when local repair fell back
//! to full regeneration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::config::EngineConfig;
use crate::constraints::ConstraintValidator;
use crate::error::{ConfigError, EngineError, ParseError};
use crate::intake::{Interpretation, RequestInterpreter};
use crate::models::{Catalog, EntitySet, Schedule, ValidationReport};
use crate::refinement::{Delta, RefinementEngine, RepairMode};
use crate::scheduler::{PairSessions, Scheduler, SearchStats, SessionPlan, TimetableKpi};
use crate::slots::{generate_slots, WeeklyWindow};

/// Everything needed to generate one weekly timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub entities: EntitySet,
    pub window: WeeklyWindow,
    /// Per-subject weekly session counts overriding the subject default.
    #[serde(default)]
    pub sessions_per_week: BTreeMap<String, u32>,
    /// Per-pair weekly session counts, applied last.
    #[serde(default)]
    pub pair_sessions: Vec<PairSessions>,
}

impl GenerationRequest {
    pub fn new(entities: EntitySet, window: WeeklyWindow) -> Self {
        Self {
            entities,
            window,
            sessions_per_week: BTreeMap::new(),
            pair_sessions: Vec::new(),
        }
    }

    /// Overrides the weekly session count of one subject.
    pub fn with_sessions_per_week(mut self, subject_id: impl Into<String>, sessions: u32) -> Self {
        self.sessions_per_week.insert(subject_id.into(), sessions);
        self
    }

    /// Overrides the weekly session count of one (subject, section) pair.
    pub fn with_pair_sessions(mut self, pair: PairSessions) -> Self {
        self.pair_sessions.push(pair);
        self
    }

    /// Builds and checks the entity catalog.
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        Catalog::new(&self.entities)
    }

    /// Session counts for every pair in scope of `catalog`.
    pub fn plan(&self, catalog: &Catalog) -> Result<SessionPlan, ConfigError> {
        SessionPlan::new(catalog, &self.sessions_per_week, &self.pair_sessions)
    }

    /// The same request with entity lists and pair overrides in ID order.
    ///
    /// Two requests that differ only in listing order have the same canonical
    /// form.
    pub fn canonical(&self) -> Self {
        let mut c = self.clone();
        c.entities.faculty.sort_by(|a, b| a.id.cmp(&b.id));
        c.entities.subjects.sort_by(|a, b| a.id.cmp(&b.id));
        c.entities.classrooms.sort_by(|a, b| a.id.cmp(&b.id));
        c.entities.sections.sort_by(|a, b| a.id.cmp(&b.id));
        c.pair_sessions
            .sort_by(|a, b| (&a.subject_id, &a.section_id).cmp(&(&b.subject_id, &b.section_id)));
        for f in &mut c.entities.faculty {
            f.unavailable.sort_by_key(|p| (p.day, p.start, p.end));
        }
        for room in &mut c.entities.classrooms {
            room.unavailable.sort_by_key(|p| (p.day, p.start, p.end));
        }
        c.window.breaks.sort();
        c
    }
}

/// A change to a previously generated timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementRequest {
    /// The request the prior schedule was generated from.
    pub request: GenerationRequest,
    pub prior: Schedule,
    pub delta: Delta,
}

/// What both request paths return to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub schedule: Schedule,
    pub validation: ValidationReport,
}

/// Stages a request passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Received,
    Slotting,
    Assigning,
    Validating,
    Repairing,
    Satisfied,
    Violated,
}

/// Result of the generation path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutcome {
    pub response: Response,
    /// States visited, in order.
    pub trace: Vec<RequestState>,
    pub stats: SearchStats,
    pub kpi: TimetableKpi,
}

/// Result of the refinement path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinementOutcome {
    pub response: Response,
    pub mode: RepairMode,
    /// The request after the delta; feed it to the next refinement.
    pub request: GenerationRequest,
    /// States visited, in order.
    pub trace: Vec<RequestState>,
    pub stats: SearchStats,
    pub kpi: TimetableKpi,
}

/// Result of [`Pipeline::handle`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Generated(GenerationOutcome),
    Refined(RefinementOutcome),
}

impl Outcome {
    pub fn response(&self) -> &Response {
        match self {
            Outcome::Generated(o) => &o.response,
            Outcome::Refined(o) => &o.response,
        }
    }
}

/// Pipeline controller.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: EngineConfig,
}

impl Pipeline {
    /// Creates a pipeline with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    ///
    /// # Errors
    /// [`ConfigError::InvalidSettings`] if `config` fails
    /// [`EngineConfig::check`].
    pub fn with_config(mut self, config: EngineConfig) -> Result<Self, ConfigError> {
        config.check()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Generates a timetable from scratch.
    ///
    /// # Errors
    /// [`ConfigError`] for a malformed catalog, window, or override. An
    /// infeasible request is not an error: it yields an unsatisfied report.
    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome, ConfigError> {
        let _span = info_span!("generate").entered();
        let mut trace = vec![RequestState::Received];

        let catalog = request.catalog()?;
        let plan = request.plan(&catalog)?;

        trace.push(RequestState::Slotting);
        let grid = generate_slots(&request.window)?;

        trace.push(RequestState::Assigning);
        let result = Scheduler::new()
            .with_settings(self.config.search)
            .assign(&catalog, &grid, &plan.requirements(), &[]);

        trace.push(RequestState::Validating);
        let validation = self.validator().validate(&catalog, &plan, &result.schedule);
        trace.push(final_state(&validation));

        let kpi = TimetableKpi::calculate(&catalog, &plan, &grid, &result.schedule);
        info!(
            entries = result.schedule.len(),
            violations = validation.violations.len(),
            warnings = validation.warnings.len(),
            satisfied = validation.satisfied,
            "Generation finished"
        );

        Ok(GenerationOutcome {
            response: Response {
                schedule: result.schedule,
                validation,
            },
            trace,
            stats: result.stats,
            kpi,
        })
    }

    /// Applies a change to a prior timetable.
    ///
    /// # Errors
    /// [`ConfigError`] if the delta references something unknown or leaves
    /// the request malformed.
    pub fn refine(&self, request: &RefinementRequest) -> Result<RefinementOutcome, ConfigError> {
        let _span = info_span!("refine", delta = request.delta.label()).entered();
        let mut trace = vec![RequestState::Received, RequestState::Repairing];

        let repair = RefinementEngine::new()
            .with_settings(self.config.search)
            .repair(&request.request, &request.prior, &request.delta)?;
        if repair.mode == RepairMode::FullRegeneration {
            trace.push(RequestState::Assigning);
        }

        trace.push(RequestState::Validating);
        let validation = self
            .validator()
            .validate(&repair.catalog, &repair.plan, &repair.schedule);
        trace.push(final_state(&validation));

        let kpi = TimetableKpi::calculate(&repair.catalog, &repair.plan, &repair.grid, &repair.schedule);
        info!(
            entries = repair.schedule.len(),
            retained = repair.retained,
            mode = ?repair.mode,
            violations = validation.violations.len(),
            satisfied = validation.satisfied,
            "Refinement finished"
        );

        Ok(RefinementOutcome {
            response: Response {
                schedule: repair.schedule,
                validation,
            },
            mode: repair.mode,
            request: repair.request,
            trace,
            stats: repair.stats,
            kpi,
        })
    }

    /// Interprets `text` and runs the matching path.
    ///
    /// `prior` is the caller's current request and schedule, needed for
    /// refinements.
    ///
    /// # Errors
    /// [`EngineError::Parse`] if the interpreter rejects the text,
    /// [`EngineError::Config`] if the resulting request is malformed.
    pub fn handle(
        &self,
        interpreter: &dyn RequestInterpreter,
        text: &str,
        prior: Option<(&GenerationRequest, &Schedule)>,
    ) -> Result<Outcome, EngineError> {
        match interpreter.interpret(text, prior.map(|(request, _)| request))? {
            Interpretation::Generate(request) => Ok(Outcome::Generated(self.generate(&request)?)),
            Interpretation::Refine(delta) => {
                let (request, schedule) = prior.ok_or(ParseError::MissingPrior)?;
                let outcome = self.refine(&RefinementRequest {
                    request: request.clone(),
                    prior: schedule.clone(),
                    delta,
                })?;
                Ok(Outcome::Refined(outcome))
            }
        }
    }

    fn validator(&self) -> ConstraintValidator {
        ConstraintValidator::new().with_policy(self.config.validation)
    }
}

fn final_state(report: &ValidationReport) -> RequestState {
    if report.satisfied {
        RequestState::Satisfied
    } else {
        RequestState::Violated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShortfallPolicy;
    use crate::intake::JsonInterpreter;
    use crate::models::{Classroom, Day, Faculty, Section, Subject, TimeSlot, ViolationKind, WarningKind};
    use chrono::NaiveTime;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new(
            EntitySet::new()
                .with_faculty(Faculty::new("F1").with_subjects(["MATH", "PHY"]))
                .with_subject(Subject::new("MATH", 2))
                .with_subject(Subject::new("PHY", 1))
                .with_classroom(Classroom::new("R1", 40))
                .with_section(Section::new("S1", 30).with_subject("MATH").with_subject("PHY")),
            WeeklyWindow::new(vec![Day::Monday, Day::Tuesday], t(9), t(11), 60),
        )
    }

    #[test]
    fn test_generate_trace_and_kpi() {
        let outcome = Pipeline::new().generate(&request()).unwrap();
        assert!(outcome.response.validation.satisfied);
        assert_eq!(outcome.response.schedule.len(), 3);
        assert_eq!(
            outcome.trace,
            vec![
                RequestState::Received,
                RequestState::Slotting,
                RequestState::Assigning,
                RequestState::Validating,
                RequestState::Satisfied,
            ]
        );
        assert!((outcome.kpi.placement_rate - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_infeasible_is_reported_not_raised() {
        let request = request().with_sessions_per_week("MATH", 4);
        let outcome = Pipeline::new().generate(&request).unwrap();

        assert!(!outcome.response.validation.satisfied);
        assert_eq!(outcome.trace.last(), Some(&RequestState::Violated));
        assert_eq!(
            outcome
                .response
                .validation
                .violations_of(ViolationKind::UnscheduledRequirement)
                .len(),
            1
        );
    }

    #[test]
    fn test_shortfall_policy_from_config() {
        let mut config = EngineConfig::default();
        config.validation.shortfall = ShortfallPolicy::Warning;
        let request = request().with_sessions_per_week("MATH", 4);

        let outcome = Pipeline::new()
            .with_config(config)
            .unwrap()
            .generate(&request)
            .unwrap();
        assert!(outcome.response.validation.satisfied);
        assert_eq!(
            outcome
                .response
                .validation
                .warnings_of(WarningKind::SessionShortfall)
                .len(),
            1
        );
    }

    #[test]
    fn test_with_config_rejects_invalid_settings() {
        let mut config = EngineConfig::default();
        config.validation.max_consecutive_sessions = 0;
        assert!(matches!(
            Pipeline::new().with_config(config).unwrap_err(),
            ConfigError::InvalidSettings(_)
        ));

        let mut config = EngineConfig::default();
        config.search.max_placement_attempts = 0;
        assert!(Pipeline::new().with_config(config).is_err());

        let pipeline = Pipeline::new().with_config(EngineConfig::default()).unwrap();
        assert_eq!(pipeline.config(), &EngineConfig::default());
    }

    #[test]
    fn test_config_errors_fail_fast() {
        let mut request = request();
        request.window.working_days.clear();
        assert_eq!(Pipeline::new().generate(&request).unwrap_err(), ConfigError::EmptyDayList);

        let request = self::request().with_sessions_per_week("BIO", 1);
        assert!(matches!(
            Pipeline::new().generate(&request).unwrap_err(),
            ConfigError::UnknownReference { .. }
        ));
    }

    #[test]
    fn test_refine_chains_requests() {
        let pipeline = Pipeline::new();
        let request = request().with_sessions_per_week("MATH", 1);
        let first = pipeline.generate(&request).unwrap();

        let outcome = pipeline
            .refine(&RefinementRequest {
                request: request.clone(),
                prior: first.response.schedule.clone(),
                delta: Delta::AddSession {
                    subject_id: "MATH".into(),
                    section_id: "S1".into(),
                },
            })
            .unwrap();
        assert_eq!(outcome.mode, RepairMode::LocalRepair);
        assert_eq!(
            outcome.trace,
            vec![
                RequestState::Received,
                RequestState::Repairing,
                RequestState::Validating,
                RequestState::Satisfied,
            ]
        );
        assert_eq!(outcome.response.schedule.len(), 3);
        assert_eq!(outcome.request.pair_sessions, vec![PairSessions::new("MATH", "S1", 2)]);

        let again = pipeline
            .refine(&RefinementRequest {
                request: outcome.request.clone(),
                prior: outcome.response.schedule.clone(),
                delta: Delta::RemoveSession {
                    subject_id: "MATH".into(),
                    section_id: "S1".into(),
                },
            })
            .unwrap();
        assert_eq!(again.response.schedule.len(), 2);
        assert!(again.response.validation.satisfied);
    }

    #[test]
    fn test_handle_structured_text() {
        let pipeline = Pipeline::new();
        let request = request();
        let text = serde_json::json!({ "generate": request }).to_string();

        let generated = pipeline.handle(&JsonInterpreter, &text, None).unwrap();
        let Outcome::Generated(first) = &generated else {
            panic!("expected generation");
        };

        let refine = r#"{"refine": {"kind": "add_session", "subject_id": "PHY", "section_id": "S1"}}"#;
        let refined = pipeline
            .handle(&JsonInterpreter, refine, Some((&request, &first.response.schedule)))
            .unwrap();
        assert!(matches!(refined, Outcome::Refined(_)));
        assert_eq!(refined.response().schedule.len(), 4);

        let err = pipeline.handle(&JsonInterpreter, refine, None).unwrap_err();
        assert_eq!(err, EngineError::Parse(ParseError::MissingPrior));
    }

    #[test]
    fn test_canonical_ignores_listing_order() {
        let a = request();
        let mut b = request();
        b.entities.subjects.reverse();
        assert_ne!(a, b);
        assert_eq!(a.canonical(), b.canonical());

        let monday = TimeSlot::new(Day::Monday, t(9), t(10));
        let friday = TimeSlot::new(Day::Friday, t(9), t(10));
        let mut c = request();
        c.entities.faculty[0] = c.entities.faculty[0].clone().with_unavailable(friday).with_unavailable(monday);
        let mut d = request();
        d.entities.faculty[0] = d.entities.faculty[0].clone().with_unavailable(monday).with_unavailable(friday);
        assert_eq!(c.canonical(), d.canonical());
    }

    #[test]
    fn test_request_json_roundtrip() {
        let request = request().with_pair_sessions(PairSessions::new("PHY", "S1", 2));
        let json = serde_json::to_string(&request).unwrap();
        let back: GenerationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
