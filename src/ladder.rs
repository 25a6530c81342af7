//! Escalation ladder as an explicit state machine.
//!
//! Transitions are pure: they see only sizes and configs, never bytes or
//! engines, so every branch can be exercised without rendering a page. The
//! orchestrator runs whatever pass [`next_action`] asks for and feeds the
//! measured size back through [`after_pass`].

use crate::policy::Policy;
use crate::safety::SafetyVerdict;
use crate::types::{AdaptiveConfig, CompressionLevel, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Primary,
    Fallback,
    Squeeze,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub kind: PassKind,
    pub config: AdaptiveConfig,
    pub size: u64,
}

/// Fixed facts about one compression request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderContext {
    pub original_size: u64,
    pub level: CompressionLevel,
    pub primary: AdaptiveConfig,
    pub custom: bool,
    pub override_safety: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LadderState {
    Init,
    Pass1Done {
        primary: Candidate,
    },
    EscalationEvaluated {
        best: Option<Candidate>,
        abort: Strategy,
    },
    SqueezeEvaluated {
        best: Option<Candidate>,
        abort: Strategy,
    },
    Final(Verdict),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Blocked { projected_dpi: u32, floor_dpi: u32 },
    Adopt(Candidate),
    KeepOriginal(Strategy),
}

impl Verdict {
    pub fn strategy(&self, ctx: &LadderContext) -> Strategy {
        match self {
            Verdict::Blocked { .. } => Strategy::Blocked,
            Verdict::Adopt(candidate) => candidate_strategy(candidate.kind, ctx),
            Verdict::KeepOriginal(strategy) => *strategy,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Run {
        kind: PassKind,
        config: AdaptiveConfig,
    },
    Advance(LadderState),
    Finish(Verdict),
}

pub fn candidate_strategy(kind: PassKind, ctx: &LadderContext) -> Strategy {
    match kind {
        PassKind::Primary if ctx.custom => Strategy::Custom,
        PassKind::Primary => Strategy::Primary,
        PassKind::Fallback => Strategy::AdaptiveFallback,
        PassKind::Squeeze => Strategy::Squeeze,
    }
}

pub fn next_action(state: &LadderState, ctx: &LadderContext, policy: &Policy) -> Action {
    match state {
        LadderState::Init => match policy.gate(&ctx.primary, ctx.override_safety) {
            SafetyVerdict::Blocked {
                projected_dpi,
                floor_dpi,
            } => Action::Finish(Verdict::Blocked {
                projected_dpi,
                floor_dpi,
            }),
            SafetyVerdict::Allowed => Action::Run {
                kind: PassKind::Primary,
                config: ctx.primary,
            },
        },
        LadderState::Pass1Done { primary } => {
            if primary.size < ctx.original_size {
                return Action::Advance(LadderState::EscalationEvaluated {
                    best: Some(*primary),
                    abort: Strategy::NoReductionPossible,
                });
            }
            // A custom config is the user's call; never swap it for a harsher one.
            if ctx.custom {
                return Action::Advance(LadderState::EscalationEvaluated {
                    best: None,
                    abort: Strategy::NoReductionPossible,
                });
            }
            let escalated = policy.escalate(&primary.config);
            if policy.gate(&escalated, ctx.override_safety).is_allowed() {
                Action::Run {
                    kind: PassKind::Fallback,
                    config: escalated,
                }
            } else {
                Action::Advance(LadderState::EscalationEvaluated {
                    best: None,
                    abort: Strategy::Pass2UnsafeSkipped,
                })
            }
        }
        LadderState::EscalationEvaluated { best, abort } => {
            let squeeze_from = best.filter(|c| wants_squeeze(c, ctx, policy));
            if let Some(current) = squeeze_from {
                let squeezed = policy.squeeze(&current.config);
                if policy.gate(&squeezed, ctx.override_safety).is_allowed() {
                    return Action::Run {
                        kind: PassKind::Squeeze,
                        config: squeezed,
                    };
                }
            }
            Action::Advance(LadderState::SqueezeEvaluated {
                best: *best,
                abort: *abort,
            })
        }
        LadderState::SqueezeEvaluated { best, abort } => Action::Finish(match best {
            Some(candidate) if candidate.size < ctx.original_size => Verdict::Adopt(*candidate),
            _ => Verdict::KeepOriginal(*abort),
        }),
        LadderState::Final(verdict) => Action::Finish(*verdict),
    }
}

/// Fold a finished pass into the ladder.
pub fn after_pass(state: &LadderState, ctx: &LadderContext, candidate: Candidate) -> LadderState {
    match (state, candidate.kind) {
        (LadderState::Init, PassKind::Primary) => LadderState::Pass1Done { primary: candidate },
        (LadderState::Pass1Done { primary }, PassKind::Fallback) => {
            let adopted = candidate.size < ctx.original_size && candidate.size < primary.size;
            LadderState::EscalationEvaluated {
                best: adopted.then_some(candidate),
                abort: Strategy::NoReductionPossible,
            }
        }
        (
            LadderState::EscalationEvaluated {
                best: Some(current),
                abort,
            },
            PassKind::Squeeze,
        ) => LadderState::SqueezeEvaluated {
            best: Some(if candidate.size < current.size {
                candidate
            } else {
                *current
            }),
            abort: *abort,
        },
        _ => LadderState::Final(Verdict::KeepOriginal(Strategy::NoReductionPossible)),
    }
}

fn wants_squeeze(candidate: &Candidate, ctx: &LadderContext, policy: &Policy) -> bool {
    ctx.level == CompressionLevel::Extreme
        && !ctx.custom
        && candidate.kind == PassKind::Primary
        && candidate.size < ctx.original_size
        && candidate.size as f64 > ctx.original_size as f64 * policy.squeeze_trigger_ratio
}
