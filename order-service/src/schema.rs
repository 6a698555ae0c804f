diesel::table! {
    orders (id) {
        id -> Varchar,
        customer_name -> Varchar,
        email -> Varchar,
        phone -> Varchar,
        zip_code -> Varchar,
        total -> Numeric,
        pickup_time -> Varchar,
        status -> Varchar,
        notification_preference -> Varchar,
        created_at -> Timestamptz,
        reminder_sent_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    order_items (id) {
        id -> Int8,
        order_id -> Varchar,
        product_id -> Varchar,
        product_name -> Varchar,
        product_price -> Numeric,
        quantity -> Int4,
        subtotal -> Numeric,
    }
}

diesel::table! {
    products (id) {
        id -> Varchar,
        name -> Varchar,
        description -> Nullable<Text>,
        price -> Numeric,
        category -> Varchar,
        image_url -> Nullable<Varchar>,
        is_available -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    settings (key) {
        key -> Varchar,
        value -> Jsonb,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(order_items -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(
    orders,
    order_items,
    products,
    settings,
);
