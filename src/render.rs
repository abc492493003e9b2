use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{
    Attempt, AttemptForEvaluation, AttemptStatus, OpenAnswerReview, QuestionType,
    QuestionWithAnswer, TestSummary, UserSummary,
};
use crate::taking::AnswerDraft;

// Pure data-to-markup functions. Nothing here touches the webview, so every
// fragment can be asserted on in tests. The shell injects the returned HTML.

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// "dd.mm.yyyy hh:mm", empty for absent timestamps.
pub fn format_date(date: Option<NaiveDateTime>) -> String {
    match date {
        Some(d) => d.format("%d.%m.%Y %H:%M").to_string(),
        None => String::new(),
    }
}

pub fn initials(first_name: &str, last_name: &str) -> String {
    let mut out = String::new();
    out.extend(first_name.chars().next().into_iter().flat_map(|c| c.to_uppercase()));
    out.extend(last_name.chars().next().into_iter().flat_map(|c| c.to_uppercase()));
    out
}

pub fn truncate(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_length).collect();
    format!("{}...", cut)
}

pub fn status_label(status: AttemptStatus) -> &'static str {
    match status {
        AttemptStatus::InProgress => "In progress",
        AttemptStatus::Completed => "Completed",
        AttemptStatus::Evaluating => "Awaiting review",
        AttemptStatus::Evaluated => "Evaluated",
    }
}

pub fn score_color_class(percent: i32) -> &'static str {
    if percent >= 90 {
        "score-excellent"
    } else if percent >= 75 {
        "score-good"
    } else if percent >= 60 {
        "score-average"
    } else {
        "score-poor"
    }
}

/// Whole days until a deadline, rounded up; negative once it has passed.
pub fn days_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (deadline - now).num_seconds();
    if seconds <= 0 {
        seconds / 86_400
    } else {
        (seconds + 86_399) / 86_400
    }
}

pub fn render_error(message: &str) -> String {
    format!(
        r#"<p class="text-center text-danger">{}</p>"#,
        escape_html(message)
    )
}

pub fn render_empty(message: &str) -> String {
    format!(r#"<p class="text-center">{}</p>"#, escape_html(message))
}

/// Test cards on the employee dashboard.
pub fn render_available_tests(tests: &[TestSummary], now: DateTime<Utc>) -> String {
    if tests.is_empty() {
        return render_empty("No tests available");
    }

    tests
        .iter()
        .map(|test| {
            let deadline_block = match test.deadline {
                Some(deadline) => {
                    let days_left = days_until(deadline.and_utc(), now);
                    let class = if days_left <= 3 { " deadline-soon" } else { "" };
                    format!(
                        r#"<div class="test-card-deadline{}">Due {} ({} d)</div>"#,
                        class,
                        format_date(Some(deadline)),
                        days_left.max(0)
                    )
                }
                None => String::new(),
            };
            let description = test
                .description
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or("No description");

            format!(
                r#"<div class="test-card" data-test-id="{id}">
    <div class="test-card-header">
        <div class="test-card-title">{title}</div>
        {deadline}
    </div>
    <div class="test-card-content">
        <p>{description}</p>
        <div class="test-card-meta">
            <span>{time} min</span>
            <span>{questions} questions</span>
            <span>{passing}% to pass</span>
        </div>
    </div>
    <div class="test-card-actions">
        <button class="btn btn-primary" data-action="start-test" data-test-id="{id}">Start test</button>
    </div>
</div>"#,
                id = test.id,
                title = escape_html(&test.title),
                deadline = deadline_block,
                description = escape_html(description),
                time = test.time_limit_minutes,
                questions = test.question_count.unwrap_or(0),
                passing = test.passing_score,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rows of the employee's attempt-history table.
pub fn render_attempt_history(attempts: &[Attempt]) -> String {
    if attempts.is_empty() {
        return r#"<tr><td colspan="6" class="text-center">No completed tests</td></tr>"#
            .to_string();
    }

    attempts
        .iter()
        .map(|attempt| {
            let result_badge = if attempt.status == AttemptStatus::Evaluated {
                let passed = attempt.passed.unwrap_or(false);
                format!(
                    r#"<span class="status-badge {}">{}</span>"#,
                    if passed { "status-active" } else { "status-failed" },
                    if passed { "Passed" } else { "Failed" }
                )
            } else {
                r#"<span class="status-badge status-pending">Pending</span>"#.to_string()
            };

            format!(
                r#"<tr>
    <td>{title}</td>
    <td>{date}</td>
    <td><strong>{score}%</strong></td>
    <td>{passing}%</td>
    <td>{result}</td>
    <td>{status}</td>
</tr>"#,
                title = escape_html(attempt.test_title.as_deref().unwrap_or("")),
                date = format_date(attempt.completed_at.or(attempt.started_at)),
                score = attempt.score.unwrap_or(0),
                passing = attempt.passing_score.unwrap_or(0),
                result = result_badge,
                status = status_label(attempt.status),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rows of the HR dashboard's recent-tests table.
pub fn render_recent_tests(tests: &[TestSummary]) -> String {
    if tests.is_empty() {
        return r#"<tr><td colspan="6" class="text-center">No tests created yet</td></tr>"#
            .to_string();
    }

    tests
        .iter()
        .map(|test| {
            let active = test.is_active.unwrap_or(false);
            format!(
                r#"<tr>
    <td>{title}</td>
    <td>{created}</td>
    <td>{questions}</td>
    <td>{passing}%</td>
    <td><span class="status-badge {status_class}">{status}</span></td>
    <td>
        <button class="btn btn-sm btn-secondary" data-action="edit-test" data-test-id="{id}">Edit</button>
        <button class="btn btn-sm btn-primary" data-action="view-results" data-test-id="{id}">Results</button>
    </td>
</tr>"#,
                title = escape_html(&test.title),
                created = format_date(test.created_at),
                questions = test.question_count.unwrap_or(0),
                passing = test.passing_score,
                status_class = if active { "status-active" } else { "status-draft" },
                status = if active { "Active" } else { "Draft" },
                id = test.id,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Review cards for attempts awaiting evaluation.
pub fn render_pending_reviews(attempts: &[AttemptForEvaluation]) -> String {
    if attempts.is_empty() {
        return render_empty("No attempts awaiting review");
    }

    attempts
        .iter()
        .map(|attempt| {
            format!(
                r#"<div class="review-card">
    <div class="review-card-header">
        <div class="review-card-title">{title}</div>
        <div class="review-card-badge">Awaiting review</div>
    </div>
    <div class="review-card-content">
        <p><strong>Employee:</strong> {employee}</p>
        <div class="review-card-meta">
            <span>Completed: {completed}</span>
            <span>Auto score: {auto}%</span>
        </div>
    </div>
    <div class="review-card-actions">
        <button class="btn btn-sm btn-primary" data-action="start-review" data-attempt-id="{id}">Start review</button>
    </div>
</div>"#,
                title = escape_html(attempt.test_title.as_deref().unwrap_or("")),
                employee = escape_html(&attempt.display_employee_name()),
                completed = format_date(attempt.completed_at),
                auto = attempt.auto_score.unwrap_or(0),
                id = attempt.id,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Checkbox list for the assign-test modal.
pub fn render_employee_checkboxes(employees: &[UserSummary]) -> String {
    employees
        .iter()
        .map(|employee| {
            format!(
                r#"<label class="checkbox-label">
    <input type="checkbox" name="employee" value="{id}">
    <span>{first} {last} ({email})</span>
</label>"#,
                id = employee.id,
                first = escape_html(&employee.first_name),
                last = escape_html(&employee.last_name),
                email = escape_html(&employee.email),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The question currently on screen, with any buffered answer restored.
pub fn render_question(question: &QuestionWithAnswer, draft: Option<&AnswerDraft>) -> String {
    match question.question_type {
        QuestionType::OpenAnswer => {
            let previous = draft
                .and_then(|d| d.open_answer_text.as_deref())
                .or(question.previous_answer.as_deref())
                .unwrap_or("");
            format!(
                r#"<div class="question" data-question-id="{id}">
    <p class="question-text">{text}</p>
    <textarea class="open-answer" data-question-id="{id}" rows="6" placeholder="Type your answer">{previous}</textarea>
</div>"#,
                id = question.id,
                text = escape_html(&question.text),
                previous = escape_html(previous),
            )
        }
        QuestionType::SingleChoice | QuestionType::MultipleChoice => {
            let input_type = if question.question_type == QuestionType::SingleChoice {
                "radio"
            } else {
                "checkbox"
            };
            let selected: &[i64] = draft
                .map(|d| d.selected_option_ids.as_slice())
                .filter(|ids| !ids.is_empty())
                .unwrap_or(&question.previous_selected_options);

            let options = question
                .options
                .iter()
                .map(|option| {
                    let checked = if selected.contains(&option.id) {
                        " checked"
                    } else {
                        ""
                    };
                    format!(
                        r#"<div class="option-item">
    <input type="{input_type}" name="choice" value="{oid}" id="option_{oid}"{checked}>
    <label class="option-content" for="option_{oid}">{text}</label>
</div>"#,
                        input_type = input_type,
                        oid = option.id,
                        checked = checked,
                        text = escape_html(&option.text),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");

            format!(
                r#"<div class="question" data-question-id="{id}">
    <p class="question-text">{text}</p>
    <div class="options">
{options}
    </div>
</div>"#,
                id = question.id,
                text = escape_html(&question.text),
                options = options,
            )
        }
    }
}

/// One open answer inside the evaluation screen.
pub fn render_open_answer_review(answer: &OpenAnswerReview, index: usize) -> String {
    let score_badge = match answer.assigned_score {
        Some(score) => format!(
            r#"<span class="badge bg-success">Scored: {}/{}</span>"#,
            score, answer.max_score
        ),
        None => r#"<span class="badge bg-warning">Needs scoring</span>"#.to_string(),
    };

    format!(
        r#"<div class="question-review" id="question-{id}">
    <div class="question-review-header">
        <h5>Question {number} (max {max} points)</h5>
        <div class="question-score-status">{badge}</div>
    </div>
    <div class="question-review-body">
        <div class="question-text"><strong>Question:</strong><p>{question}</p></div>
        <div class="answer-text"><strong>Employee answer:</strong>
            <div class="answer-content">{answer}</div>
        </div>
        <div class="evaluation-form">
            <label for="score-{id}">Score (0-{max} points):</label>
            <input type="number" id="score-{id}" class="form-control score-input" min="0" max="{max}" value="{value}">
            <small class="text-muted">Auto score: {auto} points</small>
            <label for="comment-{id}">Comment (optional):</label>
            <textarea id="comment-{id}" class="form-control" rows="2">{comment}</textarea>
        </div>
    </div>
    <div class="question-review-footer">
        <button class="btn btn-sm btn-success" data-action="save-score" data-answer-id="{id}">Save score</button>
    </div>
</div>"#,
        id = answer.id,
        number = index + 1,
        max = answer.max_score,
        badge = score_badge,
        question = escape_html(&answer.question_text),
        answer = escape_html(answer.open_answer_text.as_deref().unwrap_or("No answer")),
        value = answer
            .assigned_score
            .map(|s| s.to_string())
            .unwrap_or_default(),
        auto = answer.auto_score.unwrap_or(0),
        comment = escape_html(answer.comment.as_deref().unwrap_or("")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn escapes_markup_sensitive_characters() {
        assert_eq!(
            escape_html(r#"<b>"A & B"</b>"#),
            "&lt;b&gt;&quot;A &amp; B&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn empty_test_list_renders_placeholder() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let markup = render_available_tests(&[], now);
        assert!(markup.contains("No tests available"));
    }

    #[test]
    fn test_card_escapes_user_content() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let tests = vec![TestSummary {
            id: 3,
            title: "<script>alert(1)</script>".into(),
            description: None,
            time_limit_minutes: 30,
            passing_score: 70,
            max_possible_score: None,
            question_count: Some(10),
            is_active: Some(true),
            created_at: None,
            deadline: None,
            assigner_name: None,
        }];
        let markup = render_available_tests(&tests, now);
        assert!(!markup.contains("<script>"));
        assert!(markup.contains("&lt;script&gt;"));
        assert!(markup.contains("10 questions"));
    }

    #[test]
    fn days_until_rounds_up_partial_days() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let deadline = Utc.with_ymd_and_hms(2025, 6, 2, 11, 0, 0).unwrap();
        assert_eq!(days_until(deadline, now), 1);

        let far = Utc.with_ymd_and_hms(2025, 6, 8, 13, 0, 0).unwrap();
        assert_eq!(days_until(far, now), 8);

        let passed = Utc.with_ymd_and_hms(2025, 5, 30, 12, 0, 0).unwrap();
        assert!(days_until(passed, now) <= 0);
    }

    #[test]
    fn question_markup_restores_selection_and_text() {
        let question = QuestionWithAnswer {
            id: 9,
            text: "Pick one".into(),
            question_type: QuestionType::SingleChoice,
            order_index: Some(0),
            options: vec![
                crate::models::AnswerOption {
                    id: 1,
                    text: "First".into(),
                    order_index: Some(0),
                },
                crate::models::AnswerOption {
                    id: 2,
                    text: "Second".into(),
                    order_index: Some(1),
                },
            ],
            previous_answer: None,
            previous_selected_options: vec![2],
        };

        let markup = render_question(&question, None);
        assert!(markup.contains(r#"value="2" id="option_2" checked"#));
        assert!(!markup.contains(r#"value="1" id="option_1" checked"#));
        assert!(markup.contains(r#"type="radio""#));

        let open = QuestionWithAnswer {
            id: 10,
            text: "Explain borrowing".into(),
            question_type: QuestionType::OpenAnswer,
            order_index: Some(1),
            options: Vec::new(),
            previous_answer: Some("references without ownership".into()),
            previous_selected_options: Vec::new(),
        };
        let markup = render_question(&open, None);
        assert!(markup.contains("references without ownership"));
        assert!(markup.contains("textarea"));
    }

    #[test]
    fn review_markup_reflects_scoring_state() {
        let mut answer = OpenAnswerReview {
            id: 15,
            attempt_id: Some(4),
            question_id: Some(9),
            test_title: Some("Rust Basics".into()),
            employee_name: Some("Ivan Ivanov".into()),
            question_text: "What is a lifetime?".into(),
            max_score: 10,
            open_answer_text: Some("A region of validity".into()),
            assigned_score: None,
            auto_score: Some(0),
            comment: None,
        };
        let markup = render_open_answer_review(&answer, 0);
        assert!(markup.contains("Needs scoring"));
        assert!(markup.contains(r#"max="10""#));

        answer.assigned_score = Some(0);
        let markup = render_open_answer_review(&answer, 0);
        // A legitimate zero score still counts as scored.
        assert!(markup.contains("Scored: 0/10"));
    }

    #[test]
    fn attempt_history_handles_empty_and_pending_rows() {
        assert!(render_attempt_history(&[]).contains("No completed tests"));

        let attempts = vec![Attempt {
            id: 1,
            test_id: Some(2),
            test_title: Some("Safety Training".into()),
            user: None,
            started_at: None,
            completed_at: None,
            score: None,
            passing_score: Some(80),
            status: AttemptStatus::Evaluating,
            passed: None,
        }];
        let markup = render_attempt_history(&attempts);
        assert!(markup.contains("Pending"));
        assert!(markup.contains("Awaiting review"));
    }

    #[test]
    fn initials_are_uppercased() {
        assert_eq!(initials("ivan", "petrov"), "IP");
        assert_eq!(initials("", "petrov"), "P");
    }
}
