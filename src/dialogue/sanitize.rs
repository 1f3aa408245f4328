use itertools::Itertools;

use super::Turn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("speaker roles not alternating at {first}/{second}: {role}/{role}")]
pub struct ValidationError {
    pub first: usize,
    pub second: usize,
    pub role: String,
}

/// Merges consecutive turns by the same speaker into one, joining their text
/// with a single space. The trailing turn is always kept.
pub fn sanitize(turns: Vec<Turn>) -> Result<Vec<Turn>, ValidationError> {
    let mut merged: Vec<Turn> = Vec::with_capacity(turns.len());

    for turn in turns {
        match merged.last_mut() {
            Some(last) if last.role == turn.role => {
                last.text.push(' ');
                last.text.push_str(&turn.text);
            }
            _ => merged.push(turn),
        }
    }

    check_alternation(&merged)?;

    tracing::info!(
        roles = %merged.iter().map(|turn| turn.role.as_str()).join(", "),
        "Final roles order"
    );

    Ok(merged)
}

/// Fails on the first pair of adjacent turns sharing a role.
pub fn check_alternation(turns: &[Turn]) -> Result<(), ValidationError> {
    match turns
        .iter()
        .tuple_windows()
        .position(|(a, b)| a.role == b.role)
    {
        Some(first) => Err(ValidationError {
            first,
            second: first + 1,
            role: turns[first].role.clone(),
        }),
        None => Ok(()),
    }
}
