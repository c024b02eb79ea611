//! Value pools the generator samples from.

pub const CITIES: &[&str] = &[
    "Tokyo",
    "Osaka",
    "Seoul",
    "Jakarta",
    "Mumbai",
    "Bangkok",
    "Lagos",
    "Nairobi",
    "Cairo",
    "Accra",
    "Casablanca",
    "Johannesburg",
    "Toronto",
    "Chicago",
    "Denver",
    "Monterrey",
    "Vancouver",
    "Houston",
    "Lima",
    "Bogota",
    "Santiago",
    "Montevideo",
    "Quito",
    "Curitiba",
    "Krakow",
    "Lyon",
    "Porto",
    "Munich",
    "Gothenburg",
    "Bologna",
    "Perth",
    "Adelaide",
    "Brisbane",
    "Hobart",
    "Darwin",
    "Auckland",
];

pub const MANUFACTURERS: &[&str] = &[
    "Audi",
    "BMW",
    "Chevrolet",
    "Citroen",
    "Dacia",
    "Fiat",
    "Ford",
    "Honda",
    "Hyundai",
    "Kia",
    "Mazda",
    "Mercedes Benz",
    "Mini",
    "Nissan",
    "Peugeot",
    "Polestar",
    "Renault",
    "Skoda",
    "Tesla",
    "Toyota",
    "Volkswagen",
    "Volvo",
];

pub const MODELS: &[&str] = &[
    "Fiesta",
    "Focus",
    "Mustang",
    "Explorer",
    "Civic",
    "Accord",
    "Corolla",
    "Camry",
    "Prius",
    "Yaris",
    "Golf",
    "Passat",
    "Polo",
    "Octavia",
    "Clio",
    "Megane",
    "Sandero",
    "Model 3",
    "Model S",
    "Model Y",
    "i3",
    "X5",
    "A4",
    "Q7",
    "Leaf",
    "Qashqai",
    "Tucson",
    "Ioniq",
    "Sportage",
    "CX-5",
    "XC90",
    "Cooper",
];

pub const BODY_TYPES: &[&str] = &[
    "Sedan",
    "Hatchback",
    "Coupe",
    "Convertible",
    "SUV",
    "Wagon",
    "Minivan",
    "Cargo Van",
    "Crew Cab Pickup",
    "Extended Cab Pickup",
];

pub const ENGINE_TYPES: &[&str] = &["Gasoline", "Diesel", "Hybrid", "Electric"];
