use watched_sync_models::WatchedStatus;

/// Which of two identity-matched statuses is further along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    FirstAhead,
    SecondAhead,
    Tie,
}

/// Completed beats incomplete; between two incompletes the larger position wins;
/// two completed statuses, or equal positions, tie
pub fn precedence(x: &WatchedStatus, y: &WatchedStatus) -> Precedence {
    match (x.completed, y.completed) {
        (true, false) => Precedence::FirstAhead,
        (false, true) => Precedence::SecondAhead,
        (true, true) => Precedence::Tie,
        (false, false) => match x.time.cmp(&y.time) {
            std::cmp::Ordering::Greater => Precedence::FirstAhead,
            std::cmp::Ordering::Less => Precedence::SecondAhead,
            std::cmp::Ordering::Equal => Precedence::Tie,
        },
    }
}
