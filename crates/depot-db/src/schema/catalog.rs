diesel::table! {
    packages (name) {
        name -> Text,
        description -> Nullable<Text>,
        documentation -> Nullable<Text>,
    }
}

diesel::table! {
    package_versions (id) {
        id -> Integer,
        name -> Text,
        version -> Text,
        size -> BigInt,
        checksum -> Text,
        yanked -> Bool,
        downloaded -> Bool,
        license -> Nullable<Text>,
        last_update -> Nullable<Text>,
    }
}

diesel::table! {
    sync_history (id) {
        id -> Integer,
        revision -> Text,
        synced_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(packages, package_versions, sync_history,);
