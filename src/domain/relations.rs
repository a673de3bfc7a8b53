//! Foreign-key relationships and what happens to the referencing row when the
//! referenced row is deleted. Migrations declare the same policies; the schema
//! test in `tests/db_schema.rs` keeps the two in agreement.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Delete the referencing row together with the referenced one.
    Cascade,
    /// Keep the referencing row and clear the reference.
    SetNull,
}

impl DeletePolicy {
    /// Spelling used by `information_schema.referential_constraints.delete_rule`.
    pub fn as_sql_rule(self) -> &'static str {
        match self {
            DeletePolicy::Cascade => "CASCADE",
            DeletePolicy::SetNull => "SET NULL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub table: &'static str,
    pub column: &'static str,
    pub references: &'static str,
    pub on_delete: DeletePolicy,
}

pub const POST_AUTHOR: Relation = Relation {
    table: "posts",
    column: "author_id",
    references: "users",
    on_delete: DeletePolicy::Cascade,
};

pub const POST_GROUP: Relation = Relation {
    table: "posts",
    column: "group_id",
    references: "groups",
    on_delete: DeletePolicy::SetNull,
};

pub const COMMENT_POST: Relation = Relation {
    table: "comments",
    column: "post_id",
    references: "posts",
    on_delete: DeletePolicy::Cascade,
};

pub const COMMENT_AUTHOR: Relation = Relation {
    table: "comments",
    column: "author_id",
    references: "users",
    on_delete: DeletePolicy::Cascade,
};

pub const FOLLOW_USER: Relation = Relation {
    table: "follows",
    column: "user_id",
    references: "users",
    on_delete: DeletePolicy::Cascade,
};

pub const FOLLOW_AUTHOR: Relation = Relation {
    table: "follows",
    column: "author_id",
    references: "users",
    on_delete: DeletePolicy::Cascade,
};

pub const SESSION_USER: Relation = Relation {
    table: "sessions",
    column: "user_id",
    references: "users",
    on_delete: DeletePolicy::Cascade,
};

pub const ALL: [Relation; 7] = [
    POST_AUTHOR,
    POST_GROUP,
    COMMENT_POST,
    COMMENT_AUTHOR,
    FOLLOW_USER,
    FOLLOW_AUTHOR,
    SESSION_USER,
];

/// Look up the declared policy for `table.column`.
pub fn policy_for(table: &str, column: &str) -> Option<DeletePolicy> {
    ALL.iter()
        .find(|relation| relation.table == table && relation.column == column)
        .map(|relation| relation.on_delete)
}
