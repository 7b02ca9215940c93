use spheroid_api::Circle;

pub fn distance(p0: [f64; 2], p1: [f64; 2]) -> f64 {
    ((p0[0] - p1[0]) * (p0[0] - p1[0]) + (p0[1] - p1[1]) * (p0[1] - p1[1])).sqrt()
}

/// Inclusive containment: a point on the rim is inside.
pub fn is_point_inside_circle(point: [f64; 2], circle: &Circle) -> bool {
    let [x, y] = point;
    let slack = circle.r * circle.r - ((circle.x - x) * (circle.x - x) + (circle.y - y) * (circle.y - y));
    slack >= 0.0
}
