diesel::table! {
    load_test (id) {
        id -> BigInt,
        thread_id -> Text,
        value_col -> Nullable<Text>,
        random_data -> Nullable<Text>,
        status -> Nullable<Text>,
        created_at -> Nullable<Text>,
        updated_at -> Nullable<Text>,
    }
}
