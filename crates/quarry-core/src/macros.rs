///
/// entity_model
///
/// Declare a unit entity type and its static model.
///
/// ```ignore
/// entity_model! {
///     pub struct User => "users" {
///         FieldModel::new("Id", ScalarKind::Int).column("uid").key(),
///         FieldModel::new("Name", ScalarKind::Text).nullable(),
///     }
/// }
/// ```
///
#[macro_export]
macro_rules! entity_model {
    (@count $( $value:expr ),* ) => {
        <[()]>::len(&[ $( $crate::entity_model!(@unit $value) ),* ])
    };
    (@unit $value:expr) => {
        ()
    };
    (
        $( #[$meta:meta] )*
        $vis:vis struct $name:ident => $table:literal {
            $( $field:expr ),+ $(,)?
        }
    ) => {
        $( #[$meta] )*
        $vis struct $name;

        impl $name {
            const FIELD_MODELS: [$crate::model::FieldModel;
                $crate::entity_model!(@count $( $field ),+)
            ] = [ $( $field, )+ ];
            const MODEL_DEF: $crate::model::EntityModel = $crate::model::EntityModel {
                path: concat!(module_path!(), "::", stringify!($name)),
                name: stringify!($name),
                table: $table,
                fields: &Self::FIELD_MODELS,
            };
        }

        impl $crate::traits::EntityKind for $name {
            const MODEL: &'static $crate::model::EntityModel = &Self::MODEL_DEF;
        }
    };
}
