//! The authorization gate. Every operation an actor can attempt is a variant of [`Operation`],
//! carrying the resource facts the decision depends on, and [`permits`] is the one place that
//! decides. Handlers load the resource, ask the gate, then mutate.

use crate::{
    error::ApiError,
    model::{
        course::Course, discussion::Discussion, material::Material, role::Role, user::Actor,
    },
};

#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    ReadAssignment { course: &'a Course },
    /// Create, update or delete an assignment of the course
    ManageAssignment { course: &'a Course },
    SubmitAssignment { course: &'a Course },
    GradeSubmission { course: &'a Course },

    CreateCourse,
    /// Update or delete the course
    ManageCourse { course: &'a Course },
    Enroll,
    ListInstructorCourses { instructor_id: i32 },

    CreateMaterial { course: &'a Course },
    ManageMaterial { material: &'a Material },

    DeleteDiscussion { discussion: &'a Discussion },

    UpdateUser { user_id: i32, changes_role: bool },
    DeleteUser,
}

impl Operation<'_> {
    fn denial(&self) -> &'static str {
        match self {
            Operation::ReadAssignment { .. } => "Not authorized to view this assignment",
            Operation::ManageAssignment { .. } => "Not authorized to manage assignments for this course",
            Operation::SubmitAssignment { .. } => "Not enrolled in this course",
            Operation::GradeSubmission { .. } => "Not authorized to grade this assignment",
            Operation::CreateCourse => "Not authorized to create courses",
            Operation::ManageCourse { .. } => "Not authorized to modify this course",
            Operation::Enroll => "Only students can enroll in courses",
            Operation::ListInstructorCourses { .. } => "Not authorized to view these courses",
            Operation::CreateMaterial { .. } => "Not authorized to add materials to this course",
            Operation::ManageMaterial { .. } => "Not authorized to modify this material",
            Operation::DeleteDiscussion { .. } => "Not authorized to delete this discussion",
            Operation::UpdateUser { .. } => "Not authorized to update this user",
            Operation::DeleteUser => "Not authorized to delete users",
        }
    }
}

/// Decides whether `actor` may perform `op`. Pure: no lookups, no side effects.
pub fn permits(actor: &Actor, op: &Operation) -> bool {
    match (actor.role, op) {
        (Role::Admin, Operation::Enroll)
        | (Role::Admin, Operation::CreateMaterial { .. })
        | (Role::Admin, Operation::ManageMaterial { .. }) => false,
        (Role::Admin, _) => true,

        (Role::Teacher, Operation::ReadAssignment { course })
        | (Role::Teacher, Operation::ManageAssignment { course })
        | (Role::Teacher, Operation::GradeSubmission { course })
        | (Role::Teacher, Operation::ManageCourse { course })
        | (Role::Teacher, Operation::CreateMaterial { course }) => course.is_instructor(actor.id),
        (Role::Teacher, Operation::CreateCourse) => true,
        (Role::Teacher, Operation::ManageMaterial { material }) => material.created_by == actor.id,

        (Role::Student, Operation::ReadAssignment { course })
        | (Role::Student, Operation::SubmitAssignment { course }) => course.is_enrolled(actor.id),
        (Role::Student, Operation::Enroll) => true,

        (_, Operation::ListInstructorCourses { instructor_id }) => *instructor_id == actor.id,
        (_, Operation::DeleteDiscussion { discussion }) => discussion.author_id == actor.id,
        (_, Operation::UpdateUser {
            user_id,
            changes_role,
        }) => *user_id == actor.id && !changes_role,

        _ => false,
    }
}

pub fn require(actor: &Actor, op: Operation) -> Result<(), ApiError> {
    if permits(actor, &op) {
        Ok(())
    } else {
        tracing::info!("{} {} denied: {}", actor.role, actor.id, op.denial());
        Err(ApiError::unauthorized(op.denial()))
    }
}

/// Which assignments show up when an actor lists them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentScope {
    All,
    EnrolledBy(i32),
    TaughtBy(i32),
}

impl AssignmentScope {
    pub fn for_actor(actor: &Actor) -> Self {
        match actor.role {
            Role::Admin => AssignmentScope::All,
            Role::Teacher => AssignmentScope::TaughtBy(actor.id),
            Role::Student => AssignmentScope::EnrolledBy(actor.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{course::Enrollment, material::FileType};

    const INSTRUCTOR: i32 = 10;
    const OTHER_TEACHER: i32 = 11;
    const ENROLLED: i32 = 20;
    const OUTSIDER: i32 = 21;
    const ADMIN: i32 = 1;

    fn course() -> Course {
        let now = Utc::now();
        Course {
            id: 5,
            title: "Biology".into(),
            description: "Cells".into(),
            category: "Science".into(),
            start_date: now,
            end_date: now,
            instructor_id: INSTRUCTOR,
            created_at: now,
            enrolled_students: vec![Enrollment {
                student_id: ENROLLED,
                enrollment_date: now,
                progress: 0,
            }],
        }
    }

    fn student(id: i32) -> Actor {
        Actor::new(id, Role::Student)
    }

    fn teacher(id: i32) -> Actor {
        Actor::new(id, Role::Teacher)
    }

    fn admin() -> Actor {
        Actor::new(ADMIN, Role::Admin)
    }

    #[test]
    fn only_enrolled_students_submit() {
        let c = course();
        let op = Operation::SubmitAssignment { course: &c };
        assert!(permits(&student(ENROLLED), &op));
        assert!(!permits(&student(OUTSIDER), &op));
        assert!(!permits(&teacher(INSTRUCTOR), &op));
    }

    #[test]
    fn instructor_or_admin_grades() {
        let c = course();
        let op = Operation::GradeSubmission { course: &c };
        assert!(permits(&teacher(INSTRUCTOR), &op));
        assert!(permits(&admin(), &op));
        assert!(!permits(&teacher(OTHER_TEACHER), &op));
        assert!(!permits(&student(ENROLLED), &op));
    }

    #[test]
    fn instructor_or_admin_manages_assignments() {
        let c = course();
        let op = Operation::ManageAssignment { course: &c };
        assert!(permits(&teacher(INSTRUCTOR), &op));
        assert!(permits(&admin(), &op));
        assert!(!permits(&teacher(OTHER_TEACHER), &op));
        assert!(!permits(&student(ENROLLED), &op));
    }

    #[test]
    fn reading_follows_membership() {
        let c = course();
        let op = Operation::ReadAssignment { course: &c };
        assert!(permits(&student(ENROLLED), &op));
        assert!(permits(&teacher(INSTRUCTOR), &op));
        assert!(permits(&admin(), &op));
        assert!(!permits(&student(OUTSIDER), &op));
        assert!(!permits(&teacher(OTHER_TEACHER), &op));
    }

    #[test]
    fn enrollment_is_for_students() {
        assert!(permits(&student(OUTSIDER), &Operation::Enroll));
        assert!(!permits(&teacher(INSTRUCTOR), &Operation::Enroll));
        assert!(!permits(&admin(), &Operation::Enroll));
    }

    #[test]
    fn materials_belong_to_their_creator() {
        let c = course();
        let material = Material {
            id: 1,
            title: "Slides".into(),
            description: String::new(),
            course_id: c.id,
            file_url: "/uploads/slides.pdf".into(),
            file_type: FileType::Pdf,
            upload_date: Utc::now(),
            created_by: INSTRUCTOR,
        };
        assert!(permits(&teacher(INSTRUCTOR), &Operation::CreateMaterial { course: &c }));
        assert!(!permits(&teacher(OTHER_TEACHER), &Operation::CreateMaterial { course: &c }));
        assert!(permits(&teacher(INSTRUCTOR), &Operation::ManageMaterial { material: &material }));
        assert!(!permits(&student(ENROLLED), &Operation::ManageMaterial { material: &material }));
        assert!(!permits(&admin(), &Operation::ManageMaterial { material: &material }));
    }

    #[test]
    fn users_edit_themselves_but_not_their_role() {
        let me = student(ENROLLED);
        assert!(permits(&me, &Operation::UpdateUser { user_id: ENROLLED, changes_role: false }));
        assert!(!permits(&me, &Operation::UpdateUser { user_id: ENROLLED, changes_role: true }));
        assert!(!permits(&me, &Operation::UpdateUser { user_id: OUTSIDER, changes_role: false }));
        assert!(permits(&admin(), &Operation::UpdateUser { user_id: OUTSIDER, changes_role: true }));
        assert!(!permits(&me, &Operation::DeleteUser));
    }

    #[test]
    fn require_maps_denial_to_unauthorized() {
        let c = course();
        let err = require(&teacher(OTHER_TEACHER), Operation::GradeSubmission { course: &c })
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn scope_follows_role() {
        assert_eq!(AssignmentScope::for_actor(&admin()), AssignmentScope::All);
        assert_eq!(
            AssignmentScope::for_actor(&teacher(INSTRUCTOR)),
            AssignmentScope::TaughtBy(INSTRUCTOR)
        );
        assert_eq!(
            AssignmentScope::for_actor(&student(ENROLLED)),
            AssignmentScope::EnrolledBy(ENROLLED)
        );
    }
}
