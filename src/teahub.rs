//! Tea Hub: static product catalog and an in-memory cart.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: u32,
    pub name: &'static str,
    pub price_cents: u32,
    pub image: &'static str,
    pub description: &'static str,
}

impl Product {
    pub fn price_label(&self) -> String {
        format_price(self.price_cents)
    }
}

pub static CATALOG: [Product; 6] = [
    Product {
        id: 1,
        name: "Premium Darjeeling Tea",
        price_cents: 1299,
        image: "https://images.unsplash.com/photo-1564890369478-c89ca6d9cde9?q=80&w=1000",
        description: "Finest Darjeeling tea from the foothills of Himalayas",
    },
    Product {
        id: 2,
        name: "Organic Green Tea",
        price_cents: 999,
        image: "https://images.unsplash.com/photo-1576092768241-dec231879fc3?q=80&w=1000",
        description: "Pure organic green tea with antioxidant properties",
    },
    Product {
        id: 3,
        name: "Earl Grey Black Tea",
        price_cents: 899,
        image: "https://images.unsplash.com/photo-1523920290228-4f321a939b4c?q=80&w=1000",
        description: "Classic Earl Grey with bergamot flavor",
    },
    Product {
        id: 4,
        name: "Chamomile Herbal Tea",
        price_cents: 799,
        image: "https://images.unsplash.com/photo-1571934811356-5cc061b6821f?q=80&w=1000",
        description: "Soothing chamomile for relaxation",
    },
    Product {
        id: 5,
        name: "Tea Leaf Disease Detection Kit",
        price_cents: 2999,
        image: "https://images.unsplash.com/photo-1563911892437-1feda0179e1b?q=80&w=1000",
        description: "Professional kit to detect common tea leaf diseases",
    },
    Product {
        id: 6,
        name: "Organic Tea Fertilizer",
        price_cents: 1599,
        image: "https://images.unsplash.com/photo-1597318181409-cf64d0b5d8a5?q=80&w=1000",
        description: "Specialized fertilizer for healthy tea plants",
    },
];

/// `1299` → `$12.99`.
pub fn format_price(cents: u32) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

/// Products whose name or description contains `term`, case-insensitive.
/// An empty term matches everything.
pub fn search(term: &str) -> Vec<&'static Product> {
    let needle = term.trim().to_lowercase();
    CATALOG
        .iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
        })
        .collect()
}

pub fn find(id: u32) -> Option<&'static Product> {
    CATALOG.iter().find(|p| p.id == id)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("{0} is already in your cart.")]
    AlreadyInCart(&'static str),

    #[error("Unknown product {0}")]
    UnknownProduct(u32),
}

/// Ordered set of products, at most one of each.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Cart {
    items: Vec<&'static Product>,
}

impl Cart {
    pub fn add(&mut self, product_id: u32) -> Result<&'static Product, CartError> {
        let product = find(product_id).ok_or(CartError::UnknownProduct(product_id))?;
        if self.contains(product_id) {
            return Err(CartError::AlreadyInCart(product.name));
        }
        self.items.push(product);
        Ok(product)
    }

    /// Returns whether anything was removed.
    pub fn remove(&mut self, product_id: u32) -> bool {
        let before = self.items.len();
        self.items.retain(|p| p.id != product_id);
        self.items.len() != before
    }

    pub fn contains(&self, product_id: u32) -> bool {
        self.items.iter().any(|p| p.id == product_id)
    }

    pub fn items(&self) -> &[&'static Product] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_cents(&self) -> u32 {
        self.items.iter().map(|p| p.price_cents).sum()
    }
}

/// Cart contents as the Tea Hub screen draws them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<Product>,
    pub total_label: String,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().iter().map(|p| (*p).clone()).collect(),
            total_label: format_price(cart.total_cents()),
        }
    }
}
