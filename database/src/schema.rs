table! {
    files (id) {
        id -> Text,
        user_id -> Text,
        storage_bucket -> Text,
        storage_key_original -> Text,
        original_filename -> Text,
        extension -> Text,
        mime_type -> Nullable<Text>,
        size_bytes -> BigInt,
        status -> Text,
        error_code -> Nullable<Text>,
        error_message -> Nullable<Text>,
        storage_key_report -> Nullable<Text>,
        storage_key_raw_llm_output -> Nullable<Text>,
        prompt_version -> Nullable<Text>,
        schema_version -> Nullable<Text>,
        processing_attempts -> Integer,
        queued_at -> Nullable<Timestamptz>,
        started_at -> Nullable<Timestamptz>,
        processed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    processing_jobs (id) {
        id -> Text,
        file_id -> Text,
        status -> Text,
        attempts -> Integer,
        max_attempts -> Integer,
        next_run_at -> Timestamptz,
        locked_at -> Nullable<Timestamptz>,
        locked_by -> Nullable<Text>,
        heartbeat_at -> Nullable<Timestamptz>,
        lock_ttl_seconds -> BigInt,
        last_error_code -> Nullable<Text>,
        last_error_message -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

joinable!(processing_jobs -> files (file_id));
allow_tables_to_appear_in_same_query!(files, processing_jobs);
