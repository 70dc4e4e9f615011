use seqex_core::{Experiment, RunPhase};
use seqex_experiment::Snapshot;
use seqex_submit::{Notification, NotificationKind};

/// Screen contents for one snapshot, top to bottom.
pub fn render(experiment: &Experiment, snap: &Snapshot, notice: Option<&Notification>) -> Vec<String> {
    let mut lines = Vec::new();
    let title = if experiment.name.is_empty() {
        experiment.code.to_string()
    } else {
        experiment.name.clone()
    };
    lines.push(title);
    lines.push(String::new());

    match snap.phase {
        RunPhase::StartingExperiment => {
            if let Some(instructions) = &experiment.instructions {
                lines.extend(instructions.lines().map(str::to_string));
                lines.push(String::new());
            }
            lines.push("Press Enter to start, Esc to quit.".into());
        }
        RunPhase::WaitingStart | RunPhase::ShowingCountdown => {
            lines.push(format!("Get ready... {}", seconds(snap)));
        }
        RunPhase::StartBlock | RunPhase::DoingTrial => {
            lines.push(block_header(snap));
            lines.push(String::new());
            if let Some(sequence) = &snap.sequence {
                lines.push(format!("    {}", spaced(sequence)));
            }
            lines.push(String::new());
            lines.push(format!("Keys typed: {}", "*".repeat(snap.keys_in_trial)));
            lines.push(format!("Time left: {}", seconds(snap)));
        }
        RunPhase::BetweenTrials => {
            lines.push(block_header(snap));
            lines.push(String::new());
            match snap.last_trial_correct {
                Some(true) => lines.push("Correct!".into()),
                Some(false) => lines.push("Incorrect.".into()),
                None => {}
            }
            lines.push(format!("Next trial in {}", seconds(snap)));
        }
        RunPhase::StartRest | RunPhase::DoingRest => {
            lines.push("Rest.".into());
            lines.push(format!("Next block in {}", seconds(snap)));
        }
        RunPhase::EndBlock => lines.push("Block complete.".into()),
        RunPhase::EndExperiment | RunPhase::WaitSendData => {
            lines.push("The experiment is finished.".into());
            if snap.failed_attempts > 0 {
                lines.push(format!(
                    "Sending failed {} time(s). Press Enter to try again.",
                    snap.failed_attempts
                ));
            } else {
                lines.push("Press Enter to send your results.".into());
            }
        }
        RunPhase::AwaitingSurvey => {
            lines.push("Results sent. Submitting your survey answers...".into());
            lines.push("Press Enter to retry if nothing happens.".into());
        }
        RunPhase::Idle => {
            if let Some(code) = &snap.subject_code {
                lines.push(format!("Your subject code: {code}"));
            }
            if let Some(target) = &snap.redirect_to {
                lines.push(format!("Continue at {target}"));
            }
            lines.push("Press any key to exit.".into());
        }
    }

    if let Some(notice) = notice {
        lines.push(String::new());
        lines.push(notification_line(notice));
    }
    lines
}

fn block_header(snap: &Snapshot) -> String {
    let block = if snap.practice {
        "Practice".to_string()
    } else {
        format!("Block {} of {}", snap.block_num, snap.total_blocks)
    };
    match snap.trials_left {
        Some(left) => format!("{block}  trial {} ({left} left)", snap.trial_num),
        None => format!("{block}  trial {}", snap.trial_num),
    }
}

fn seconds(snap: &Snapshot) -> String {
    snap.remaining_seconds
        .map_or_else(String::new, |s| format!("{s}s"))
}

fn spaced(sequence: &str) -> String {
    let mut out = String::with_capacity(sequence.len() * 2);
    for (i, c) in sequence.chars().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

fn notification_line(notice: &Notification) -> String {
    let tag = match notice.kind {
        NotificationKind::Success => "ok",
        NotificationKind::Error => "error",
        NotificationKind::Info => "info",
    };
    match &notice.text {
        Some(text) => format!("[{tag}] {}: {text}", notice.title),
        None => format!("[{tag}] {}", notice.title),
    }
}
