use std::{
    collections::{HashMap, hash_map::Entry},
    fmt,
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Submitted,
    Graded,
    Late,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Graded => "graded",
            SubmissionStatus::Late => "late",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(SubmissionStatus::Submitted),
            "graded" => Ok(SubmissionStatus::Graded),
            "late" => Ok(SubmissionStatus::Late),
            other => Err(format!("Unknown submission status: {other}")),
        }
    }
}

/// A student's single current response to an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub student_id: i32,
    pub submission_date: DateTime<Utc>,
    pub file_url: String,
    pub grade: Option<f64>,
    pub feedback: String,
    pub rating: Option<i16>,
    pub status: SubmissionStatus,
}

/// The fields a grader provides. `rating` left as `None` keeps whatever rating was there before.
#[derive(Debug, Clone, Default)]
pub struct Grading {
    pub grade: f64,
    pub feedback: String,
    pub rating: Option<i16>,
}

/// Partial update of an assignment's mutable fields
#[derive(Debug, Clone, Default)]
pub struct AssignmentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub total_points: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub course_id: i32,
    pub due_date: DateTime<Utc>,
    pub total_points: i32,
    pub created_at: DateTime<Utc>,
    /// Keyed by student id, so a student can never hold two submissions
    #[serde(serialize_with = "submissions_in_order")]
    pub submissions: HashMap<i32, Submission>,
}

fn submissions_in_order<S: Serializer>(
    submissions: &HashMap<i32, Submission>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut ordered = submissions.values().collect::<Vec<&Submission>>();
    ordered.sort_by_key(|s| (s.submission_date, s.student_id));
    serializer.collect_seq(ordered)
}

pub fn validate_total_points(total_points: i32) -> Result<(), ApiError> {
    if total_points <= 0 {
        return Err(ApiError::validation("totalPoints must be a positive integer"));
    }
    Ok(())
}

impl Assignment {
    /// Lateness is a strict comparison against the due date
    pub fn is_late(&self, at: DateTime<Utc>) -> bool {
        at > self.due_date
    }

    /// Records a student's submission made at `now`.
    ///
    /// The first call creates the submission; later calls replace its file and date and decide
    /// lateness again. A submission that has already been graded is closed to resubmission.
    pub fn submit(
        &mut self,
        student_id: i32,
        file_url: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<&Submission, ApiError> {
        let file_url = file_url.into();
        if file_url.trim().is_empty() {
            return Err(ApiError::validation("fileUrl is required"));
        }

        let status = if self.is_late(now) {
            SubmissionStatus::Late
        } else {
            SubmissionStatus::Submitted
        };

        match self.submissions.entry(student_id) {
            Entry::Occupied(entry) => {
                let submission = entry.into_mut();
                if submission.status == SubmissionStatus::Graded {
                    return Err(ApiError::validation("Submission already graded"));
                }

                submission.file_url = file_url;
                submission.submission_date = now;
                submission.status = status;
                Ok(submission)
            }
            Entry::Vacant(entry) => Ok(entry.insert(Submission {
                student_id,
                submission_date: now,
                file_url,
                grade: None,
                feedback: String::new(),
                rating: None,
                status,
            })),
        }
    }

    /// Grades the student's submission. Everything is validated before anything is written, so a
    /// rejected grading leaves the submission as it was.
    pub fn grade(&mut self, student_id: i32, grading: Grading) -> Result<&Submission, ApiError> {
        if let Some(rating) = grading.rating
            && !(1..=5).contains(&rating)
        {
            return Err(ApiError::validation("Rating must be between 1 and 5 stars"));
        }

        if !grading.grade.is_finite()
            || grading.grade < 0.0
            || grading.grade > f64::from(self.total_points)
        {
            return Err(ApiError::validation(format!(
                "Grade must be between 0 and {}",
                self.total_points
            )));
        }

        let Some(submission) = self.submissions.get_mut(&student_id) else {
            return Err(ApiError::not_found("Submission not found"));
        };

        submission.grade = Some(grading.grade);
        submission.feedback = grading.feedback;
        if grading.rating.is_some() {
            submission.rating = grading.rating;
        }
        submission.status = SubmissionStatus::Graded;

        Ok(submission)
    }

    /// The highest grade awarded so far, if any submission has been graded
    pub fn highest_grade(&self) -> Option<f64> {
        self.submissions
            .values()
            .filter_map(|s| s.grade)
            .reduce(f64::max)
    }

    /// Applies the provided fields. Lowering `total_points` below a grade already awarded is
    /// rejected, so every stored grade stays within range.
    pub fn apply(&mut self, update: AssignmentUpdate) -> Result<(), ApiError> {
        if let Some(total_points) = update.total_points {
            validate_total_points(total_points)?;

            if let Some(highest) = self.highest_grade()
                && highest > f64::from(total_points)
            {
                return Err(ApiError::validation(format!(
                    "totalPoints cannot be lower than an awarded grade of {highest}"
                )));
            }
        }

        if let Some(title) = update.title.filter(|t| !t.is_empty()) {
            self.title = title;
        }
        if let Some(description) = update.description.filter(|d| !d.is_empty()) {
            self.description = description;
        }
        if let Some(due_date) = update.due_date {
            self.due_date = due_date;
        }
        if let Some(total_points) = update.total_points {
            self.total_points = total_points;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn assignment() -> Assignment {
        Assignment {
            id: 1,
            title: "Essay".into(),
            description: "Write an essay".into(),
            course_id: 7,
            due_date: at(10, 0),
            total_points: 100,
            created_at: at(1, 0),
            submissions: HashMap::new(),
        }
    }

    fn grading(grade: f64, rating: Option<i16>) -> Grading {
        Grading {
            grade,
            feedback: "Good".into(),
            rating,
        }
    }

    #[test]
    fn resubmission_replaces_instead_of_appending() {
        let mut a = assignment();
        a.submit(3, "/uploads/first.pdf", at(5, 0)).unwrap();
        a.submit(3, "/uploads/second.pdf", at(6, 0)).unwrap();

        assert_eq!(a.submissions.len(), 1);
        let s = a.submissions.get(&3).unwrap();
        assert_eq!(s.file_url, "/uploads/second.pdf");
        assert_eq!(s.submission_date, at(6, 0));
    }

    #[test]
    fn lateness_is_strictly_after_the_due_date() {
        let mut a = assignment();
        assert_eq!(
            a.submit(1, "on-time", a.due_date).unwrap().status,
            SubmissionStatus::Submitted
        );
        assert_eq!(
            a.submit(2, "late", a.due_date + chrono::TimeDelta::seconds(1))
                .unwrap()
                .status,
            SubmissionStatus::Late
        );
    }

    #[test]
    fn resubmission_reevaluates_lateness() {
        let mut a = assignment();
        a.submit(3, "late", at(11, 0)).unwrap();
        a.due_date = at(20, 0);

        let s = a.submit(3, "extended", at(12, 0)).unwrap();
        assert_eq!(s.status, SubmissionStatus::Submitted);
    }

    #[test]
    fn empty_file_url_is_rejected() {
        let mut a = assignment();
        assert!(matches!(
            a.submit(3, "  ", at(5, 0)),
            Err(ApiError::Validation(_))
        ));
        assert!(a.submissions.is_empty());
    }

    #[test]
    fn late_submission_then_grading() {
        let mut a = assignment();
        let s = a.submit(3, "/uploads/essay.pdf", at(11, 0)).unwrap();
        assert_eq!(s.status, SubmissionStatus::Late);

        let s = a.grade(3, grading(85.0, Some(4))).unwrap();
        assert_eq!(s.status, SubmissionStatus::Graded);
        assert_eq!(s.grade, Some(85.0));
        assert_eq!(s.rating, Some(4));
        assert_eq!(s.feedback, "Good");
    }

    #[test]
    fn grading_always_ends_graded() {
        let mut a = assignment();
        a.submit(1, "on-time", at(9, 0)).unwrap();
        a.submit(2, "late", at(12, 0)).unwrap();

        for student in [1, 2] {
            let s = a.grade(student, grading(50.0, None)).unwrap();
            assert_eq!(s.status, SubmissionStatus::Graded);
        }
    }

    #[test]
    fn out_of_range_rating_leaves_submission_untouched() {
        let mut a = assignment();
        a.submit(3, "file", at(5, 0)).unwrap();
        let before = a.submissions.get(&3).cloned();

        for rating in [0, 6, -1] {
            assert!(matches!(
                a.grade(3, grading(90.0, Some(rating))),
                Err(ApiError::Validation(_))
            ));
        }
        assert_eq!(a.submissions.get(&3).cloned(), before);
    }

    #[test]
    fn grade_is_bounded_by_total_points() {
        let mut a = assignment();
        a.submit(3, "file", at(5, 0)).unwrap();

        assert!(matches!(
            a.grade(3, grading(100.5, None)),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            a.grade(3, grading(-1.0, None)),
            Err(ApiError::Validation(_))
        ));
        assert!(a.grade(3, grading(100.0, None)).is_ok());
    }

    #[test]
    fn grading_without_rating_keeps_previous_rating() {
        let mut a = assignment();
        a.submit(3, "file", at(5, 0)).unwrap();
        a.grade(3, grading(70.0, Some(2))).unwrap();

        let s = a.grade(3, grading(80.0, None)).unwrap();
        assert_eq!(s.rating, Some(2));
        assert_eq!(s.grade, Some(80.0));
    }

    #[test]
    fn grading_a_missing_submission_is_not_found() {
        let mut a = assignment();
        assert!(matches!(
            a.grade(42, grading(10.0, None)),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn graded_submissions_are_closed() {
        let mut a = assignment();
        a.submit(3, "file", at(5, 0)).unwrap();
        a.grade(3, grading(60.0, None)).unwrap();

        assert!(matches!(
            a.submit(3, "other", at(6, 0)),
            Err(ApiError::Validation(_))
        ));
        assert_eq!(a.submissions.get(&3).unwrap().file_url, "file");
    }

    #[test]
    fn update_applies_only_given_fields() {
        let mut a = assignment();
        a.apply(AssignmentUpdate {
            title: Some("Long essay".into()),
            total_points: Some(50),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(a.title, "Long essay");
        assert_eq!(a.description, "Write an essay");
        assert_eq!(a.total_points, 50);

        assert!(a
            .apply(AssignmentUpdate {
                total_points: Some(0),
                ..Default::default()
            })
            .is_err());
        assert_eq!(a.total_points, 50);
    }

    #[test]
    fn submissions_serialize_as_a_list() {
        let mut a = assignment();
        a.submit(9, "b", at(6, 0)).unwrap();
        a.submit(4, "a", at(5, 0)).unwrap();

        let json = serde_json::to_value(&a).unwrap();
        let subs = json["submissions"].as_array().unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0]["studentId"], 4);
        assert_eq!(subs[1]["status"], "submitted");
        assert_eq!(json["totalPoints"], 100);
    }

    #[test]
    fn total_points_cannot_drop_below_awarded_grades() {
        let mut a = assignment();
        a.submit(3, "/uploads/essay.pdf", at(5, 0)).unwrap();
        a.grade(3, grading(85.0, Some(4))).unwrap();

        let err = a
            .apply(AssignmentUpdate {
                title: Some("Renamed".into()),
                total_points: Some(50),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(a.total_points, 100);
        assert_eq!(a.title, "Essay");

        a.apply(AssignmentUpdate {
            total_points: Some(85),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(a.total_points, 85);
        assert_eq!(a.highest_grade(), Some(85.0));
    }
}
