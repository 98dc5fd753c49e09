//! Esquema Diesel (escrito a mano). Reemplazable con `diesel print-schema`.

diesel::table! {
    workflow_definitions (definition_id) {
        definition_id -> Uuid,
        tenant_id -> BigInt,
        user_id -> BigInt,
        user_name -> Text,
        create_date -> Timestamptz,
        modified_date -> Timestamptz,
        name -> Text,
        title -> Text,
        description -> Text,
        content -> Text,
        version -> Integer,
        active -> Bool,
        start_node_id -> Nullable<BigInt>,
    }
}

diesel::table! {
    workflow_definition_versions (version_id) {
        version_id -> Uuid,
        definition_id -> Uuid,
        tenant_id -> BigInt,
        user_id -> BigInt,
        user_name -> Text,
        status_by_user_id -> BigInt,
        status_by_user_name -> Text,
        status_date -> Timestamptz,
        create_date -> Timestamptz,
        name -> Text,
        title -> Text,
        description -> Text,
        content -> Text,
        version -> Text,
        version_major -> Integer,
        version_minor -> Integer,
        active -> Bool,
        start_node_id -> Nullable<BigInt>,
        status -> Integer,
    }
}

diesel::allow_tables_to_appear_in_same_query!(workflow_definitions, workflow_definition_versions,);
