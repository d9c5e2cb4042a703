//! Taint and toleration matching

use fitcheck_core::{Taint, Toleration};

/// Do not schedule new pods onto the node unless they tolerate the taint
pub const TAINT_EFFECT_NO_SCHEDULE: &str = "NoSchedule";
/// Try to avoid the node, but do not forbid it
pub const TAINT_EFFECT_PREFER_NO_SCHEDULE: &str = "PreferNoSchedule";
/// Evict running pods that do not tolerate the taint
pub const TAINT_EFFECT_NO_EXECUTE: &str = "NoExecute";

/// Toleration value must equal the taint value
pub const TOLERATION_OP_EQUAL: &str = "Equal";
/// Toleration matches any value of the key
pub const TOLERATION_OP_EXISTS: &str = "Exists";

/// Decides whether a toleration covers a taint
pub trait ToleratesTaint {
    fn tolerates_taint(&self, taint: &Taint) -> bool;
}

impl ToleratesTaint for Toleration {
    /// An empty effect matches every effect and an empty key matches every
    /// key. `Equal` (the default operator) also requires equal values.
    fn tolerates_taint(&self, taint: &Taint) -> bool {
        if let Some(effect) = self.effect.as_deref().filter(|e| !e.is_empty()) {
            if effect != taint.effect {
                return false;
            }
        }

        if let Some(key) = self.key.as_deref().filter(|k| !k.is_empty()) {
            if key != taint.key {
                return false;
            }
        }

        match self.operator.as_deref().unwrap_or_default() {
            "" | TOLERATION_OP_EQUAL => {
                self.value.as_deref().unwrap_or_default()
                    == taint.value.as_deref().unwrap_or_default()
            }
            TOLERATION_OP_EXISTS => true,
            _ => false,
        }
    }
}

/// Whether any of `tolerations` tolerates `taint`
pub fn tolerations_tolerate_taint(tolerations: &[Toleration], taint: &Taint) -> bool {
    tolerations.iter().any(|t| t.tolerates_taint(taint))
}

/// Return the first taint, in order, that passes `inclusion_filter` and is
/// not tolerated. `None` filter considers every taint. `None` result means
/// every considered taint is tolerated.
pub fn find_matching_untolerated_taint<'t>(
    taints: &'t [Taint],
    tolerations: &[Toleration],
    inclusion_filter: Option<&dyn Fn(&Taint) -> bool>,
) -> Option<&'t Taint> {
    taints
        .iter()
        .filter(|taint| inclusion_filter.map_or(true, |include| include(taint)))
        .find(|taint| !tolerations_tolerate_taint(tolerations, taint))
}

/// Inclusion filter for taints that evict running pods
pub fn no_execute_filter(taint: &Taint) -> bool {
    taint.effect == TAINT_EFFECT_NO_EXECUTE
}

/// Inclusion filter for taints that block placement of new pods
pub fn do_not_schedule_filter(taint: &Taint) -> bool {
    taint.effect == TAINT_EFFECT_NO_SCHEDULE || taint.effect == TAINT_EFFECT_NO_EXECUTE
}
