//! The closed set of operations a supplier chain understands and the values it answers with.
use crate::cursor::Cursor;
use crate::entity::Category;
use crate::entity::Message;
use crate::entity::Order;
use crate::entity::Product;
use crate::error::StoreError;
use crate::error::StoreResult;
use crate::list::EntityList;
use crate::tree::TreeMutation;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreRequest {
    ProductSave(Product),
    ProductGet(String),
    ProductUpdate(Product),
    ProductDelete(String),
    ProductList(Cursor),

    OrderSave(Order),
    OrderGet(String),
    OrderUpdate(Order),
    OrderDelete(String),
    OrderList {
        customer_id: Option<String>,
        cursor:      Cursor,
    },

    MessageSave(Message),
    MessageGet(String),
    MessageUpdate(Message),
    MessageDelete(String),
    MessageList {
        channel_id: String,
        cursor:     Cursor,
    },

    CategoryGet(String),
    CategoryGetMany(Vec<String>),
    CategoryDescendants(String),
    CategoryPath(String),
    CategoryRoots,
    CategoryMutate(TreeMutation),
}

impl StoreRequest {
    /// Short operation name used in logs and error contexts.
    pub fn op(&self) -> &'static str {
        match self {
            Self::ProductSave(_) => "product.save",
            Self::ProductGet(_) => "product.get",
            Self::ProductUpdate(_) => "product.update",
            Self::ProductDelete(_) => "product.delete",
            Self::ProductList(_) => "product.list",
            Self::OrderSave(_) => "order.save",
            Self::OrderGet(_) => "order.get",
            Self::OrderUpdate(_) => "order.update",
            Self::OrderDelete(_) => "order.delete",
            Self::OrderList { .. } => "order.list",
            Self::MessageSave(_) => "message.save",
            Self::MessageGet(_) => "message.get",
            Self::MessageUpdate(_) => "message.update",
            Self::MessageDelete(_) => "message.delete",
            Self::MessageList { .. } => "message.list",
            Self::CategoryGet(_) => "category.get",
            Self::CategoryGetMany(_) => "category.get_many",
            Self::CategoryDescendants(_) => "category.descendants",
            Self::CategoryPath(_) => "category.path",
            Self::CategoryRoots => "category.roots",
            Self::CategoryMutate(m) => m.op(),
        }
    }

    /// Whether the request changes persistent state.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::ProductSave(_)
                | Self::ProductUpdate(_)
                | Self::ProductDelete(_)
                | Self::OrderSave(_)
                | Self::OrderUpdate(_)
                | Self::OrderDelete(_)
                | Self::MessageSave(_)
                | Self::MessageUpdate(_)
                | Self::MessageDelete(_)
                | Self::CategoryMutate(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreResponse {
    Product(Product),
    Products(EntityList<Product>),
    Order(Order),
    Orders(EntityList<Order>),
    Message(Message),
    Messages(EntityList<Message>),
    Category(Category),
    Categories(EntityList<Category>),
    /// The operation succeeded and has nothing to return.
    Done,
}

impl StoreResponse {
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Product(_) => "product",
            Self::Products(_) => "products",
            Self::Order(_) => "order",
            Self::Orders(_) => "orders",
            Self::Message(_) => "message",
            Self::Messages(_) => "messages",
            Self::Category(_) => "category",
            Self::Categories(_) => "categories",
            Self::Done => "done",
        }
    }
}

/// Typed extraction of the value a request was expected to produce.
pub trait FromResponse: Sized {
    fn from_response(response: StoreResponse) -> StoreResult<Self>;
}

fn unexpected(expected: &'static str, got: &StoreResponse) -> StoreError {
    tracing::error!("Expected a '{expected}' response, got '{}'", got.variant());
    StoreError::internal("store.unexpected_response")
}

macro_rules! response_conversions {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        $(
            impl From<$ty> for StoreResponse {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }

            impl FromResponse for $ty {
                fn from_response(response: StoreResponse) -> StoreResult<Self> {
                    match response {
                        StoreResponse::$variant(value) => Ok(value),
                        other => Err(unexpected(stringify!($variant), &other)),
                    }
                }
            }
        )+
    };
}

response_conversions!(
    Product(Product),
    Products(EntityList<Product>),
    Order(Order),
    Orders(EntityList<Order>),
    Message(Message),
    Messages(EntityList<Message>),
    Category(Category),
    Categories(EntityList<Category>),
);

impl FromResponse for () {
    fn from_response(response: StoreResponse) -> StoreResult<Self> {
        match response {
            StoreResponse::Done => Ok(()),
            other => Err(unexpected("Done", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_extraction() {
        let product = Product::new("Chair", 12.5);
        let response = StoreResponse::from(product.clone());
        assert_eq!(Product::from_response(response).unwrap(), product);
        assert!(<()>::from_response(StoreResponse::Done).is_ok());
    }

    #[test]
    fn mismatch_is_internal() {
        let err = Order::from_response(StoreResponse::Done).unwrap_err();
        assert_eq!(err.code(), "store.unexpected_response");
    }

    #[test]
    fn writes_are_flagged() {
        assert!(StoreRequest::ProductDelete("x".into()).is_write());
        assert!(!StoreRequest::ProductGet("x".into()).is_write());
        assert!(!StoreRequest::CategoryRoots.is_write());
    }
}
