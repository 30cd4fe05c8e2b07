table! {
    global_page_permissions (id) {
        id -> Int4,
        user -> Nullable<Int4>,
        group -> Nullable<Int4>,
        permissions -> Int4,
    }
}

table! {
    group_members (group, user) {
        group -> Int4,
        user -> Int4,
    }
}

table! {
    groups (id) {
        id -> Int4,
        name -> Varchar,
        created_by -> Nullable<Int4>,
    }
}

table! {
    page_moderator_states (id) {
        id -> Int4,
        page -> Int4,
        user -> Nullable<Int4>,
        action -> crate::db::types::Moderator_action,
        created -> Timestamp,
        message -> Text,
    }
}

table! {
    page_moderators (id) {
        id -> Int4,
        page -> Int4,
        user -> Int4,
        moderate_page -> Bool,
        moderate_children -> Bool,
        moderate_descendants -> Bool,
    }
}

table! {
    page_permissions (id) {
        id -> Int4,
        page -> Int4,
        user -> Nullable<Int4>,
        group -> Nullable<Int4>,
        permissions -> Int4,
        grant_on -> crate::db::types::Grant_on,
    }
}

table! {
    pages (id) {
        id -> Int4,
        parent -> Nullable<Int4>,
        level -> Int4,
        title -> Varchar,
        slug -> Varchar,
        published -> Bool,
        moderator_state -> crate::db::types::Moderator_state,
        public_page -> Nullable<Int4>,
        changed -> Timestamp,
    }
}

table! {
    plugins (id) {
        id -> Int4,
        page -> Int4,
        position -> Int4,
        kind -> Varchar,
        body -> Text,
    }
}

table! {
    public_pages (id) {
        id -> Int4,
        parent -> Nullable<Int4>,
        level -> Int4,
        title -> Varchar,
        slug -> Varchar,
        published -> Bool,
    }
}

table! {
    public_plugins (id) {
        id -> Int4,
        page -> Int4,
        position -> Int4,
        kind -> Varchar,
        body -> Text,
    }
}

table! {
    search_index (page) {
        page -> Int4,
        title -> Varchar,
        text -> Text,
    }
}

table! {
    users (id) {
        id -> Int4,
        email -> Varchar,
        name -> Varchar,
        is_super -> Bool,
        is_staff -> Bool,
        created_by -> Nullable<Int4>,
    }
}

joinable!(group_members -> groups (group));
joinable!(group_members -> users (user));
joinable!(page_moderator_states -> pages (page));
joinable!(page_moderators -> pages (page));
joinable!(page_moderators -> users (user));
joinable!(page_permissions -> pages (page));
joinable!(plugins -> pages (page));
joinable!(public_plugins -> public_pages (page));
joinable!(search_index -> public_pages (page));

allow_tables_to_appear_in_same_query!(
    global_page_permissions,
    group_members,
    groups,
    page_moderator_states,
    page_moderators,
    page_permissions,
    pages,
    plugins,
    public_pages,
    public_plugins,
    search_index,
    users,
);
