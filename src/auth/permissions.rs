use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnGrades,
    ViewOwnSchedule,

    RecordGrades,
    RecordAttendance,
    ViewTeachingAssignments,

    ManageClasses,
    ManageSubjects,
    ManageSchedule,
    ManageUsers,
    ViewAllUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Administrator,
    Teacher,
    Student,
}

static STUDENT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnGrades);
    permissions.insert(Permission::ViewOwnSchedule);

    permissions
});

static TEACHER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(STUDENT_PERMISSIONS.iter().copied());

    permissions.insert(Permission::RecordGrades);
    permissions.insert(Permission::RecordAttendance);
    permissions.insert(Permission::ViewTeachingAssignments);

    permissions
});

static ADMINISTRATOR_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ManageClasses);
    permissions.insert(Permission::ManageSubjects);
    permissions.insert(Permission::ManageSchedule);
    permissions.insert(Permission::ManageUsers);
    permissions.insert(Permission::ViewAllUsers);

    permissions
});

impl Role {
    pub const ALL: [Role; 3] = [Role::Administrator, Role::Teacher, Role::Student];

    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Administrator => &ADMINISTRATOR_PERMISSIONS,
            Role::Teacher => &TEACHER_PERMISSIONS,
            Role::Student => &STUDENT_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "Administrator",
            Role::Teacher => "Teacher",
            Role::Student => "Student",
        }
    }

    /// The only place a role tag becomes a `Role`; unknown tags are rejected
    /// up front instead of dispatched at runtime.
    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "Administrator" => Ok(Role::Administrator),
            "Teacher" => Ok(Role::Teacher),
            "Student" => Ok(Role::Student),
            _ => Err(AppError::InvalidArgument(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
